pub mod issuers;
pub mod payload;
pub mod revocation;
pub mod rules;
pub mod scalar;

pub use issuers::{IssuerList, IssuerRef};
pub use payload::DecodedPayload;
pub use revocation::{RevocationData, RevocationListResponse};
pub use rules::{CacheExpiry, CachePolicy, ExemptionRule, RuleDocument, RuleSet, VaccineRule};
pub use scalar::Scalar;
