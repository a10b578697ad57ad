//! Issuer identity helpers: the well-known key-discovery suffix, the
//! normalized form used for rule-target matching, and the
//! filesystem-safe name used for on-disk cache paths.

/// Well-known key-discovery suffix carried by direct issuer targets.
pub const WELL_KNOWN_JWKS_SUFFIX: &str = ".well-known/jwks.json";

/// Well-known CRL path under an issuer, parameterized by key id.
pub const WELL_KNOWN_CRL_FORMAT: &str = ".well-known/crl/{kid}.json";

/// Strips the well-known JWKS suffix (and the slash joining it) from an
/// issuer identifier, leaving the bare issuer URL without a trailing
/// slash.
pub fn strip_well_known_suffix(issuer: &str) -> String {
    let trimmed = issuer.trim();
    let bare = trimmed
        .strip_suffix(WELL_KNOWN_JWKS_SUFFIX)
        .unwrap_or(trimmed);
    bare.trim_end_matches('/').to_string()
}

/// Canonical comparison form of an issuer: trimmed, suffix-stripped,
/// lowercased.
pub fn normalize(issuer: &str) -> String {
    strip_well_known_suffix(issuer).to_lowercase()
}

/// Filesystem-safe name for an issuer-scoped cache directory or file,
/// e.g. `https://smarthealthcard.phsa.ca/v1/issuer` becomes
/// `smarthealthcard.phsa.ca~v1~issuer`.
pub fn file_path_safe_name(identifier: &str) -> String {
    let normalized = normalize(identifier);
    let without_scheme = normalized
        .strip_prefix("https://")
        .or_else(|| normalized.strip_prefix("http://"))
        .unwrap_or(&normalized);
    without_scheme
        .trim_matches('/')
        .replace(['/', ':'], "~")
}

/// Endpoint of the published revocation list for `(issuer, kid)`.
pub fn crl_endpoint(issuer: &str, kid: &str) -> String {
    let base = strip_well_known_suffix(issuer);
    let path = WELL_KNOWN_CRL_FORMAT.replace("{kid}", kid);
    format!("{base}/{path}")
}
