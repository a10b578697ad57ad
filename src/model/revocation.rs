use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scalar::Scalar;

/// Wire form of an issuer-published credential revocation list for one
/// signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationListResponse {
    pub kid: String,
    pub method: String,
    /// Opaque version token; an unchanged counter means the cached list
    /// is already current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctr: Option<Scalar>,
    /// Revoked ids, optionally carrying an `id.epochSeconds` suffix that
    /// limits the revocation to credentials issued before that moment.
    pub rids: Vec<String>,
}

/// Normalized revocation entry for one `(issuer, kid)` pair. Built at
/// ingest time; membership tests run against the decomposed raw ids.
#[derive(Debug, Clone)]
pub struct RevocationData {
    pub kid: String,
    pub rids: HashSet<String>,
    pub ctr: Option<String>,
    pub revocation_expiry: HashMap<String, DateTime<Utc>>,
}

impl From<&RevocationListResponse> for RevocationData {
    fn from(response: &RevocationListResponse) -> Self {
        let mut rids = HashSet::new();
        let mut revocation_expiry = HashMap::new();
        // Example rids: ["AQPCj4wwk6Mt", "lHKzqFUMjhs.1636977600"]
        for compound in &response.rids {
            let mut parts = compound.splitn(2, '.');
            let raw_id = parts.next().unwrap_or_default().to_string();
            if let Some(suffix) = parts.next()
                && let Ok(epoch_seconds) = suffix.parse::<i64>()
                && let Some(cutoff) = DateTime::from_timestamp(epoch_seconds, 0)
            {
                revocation_expiry.insert(raw_id.clone(), cutoff);
            }
            rids.insert(raw_id);
        }
        Self {
            kid: response.kid.clone(),
            rids,
            ctr: response.ctr.as_ref().map(Scalar::raw_value),
            revocation_expiry,
        }
    }
}
