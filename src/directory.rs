//! Key/issuer directory collaborators. Key discovery and JWKS storage
//! live outside this crate; the stores only need these two call shapes.

use async_trait::async_trait;

use crate::model::Scalar;

/// An issuer's active signing key as the directory reports it.
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub kid: String,
    /// Issuer-supplied CRL version token, when the directory carries one.
    pub ctr: Option<Scalar>,
}

/// Reports the active signing keys for an issuer. `None` means the
/// directory has no key material for that issuer right now.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    async fn active_signing_keys(&self, issuer: &str) -> Option<Vec<SigningKey>>;
}

/// Reports the issuers participating in the trust network.
#[async_trait]
pub trait IssuerDirectory: Send + Sync {
    async fn participating_issuers(&self) -> Option<Vec<String>>;
}
