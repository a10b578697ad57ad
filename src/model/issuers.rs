use serde::{Deserialize, Serialize};

/// Published directory of issuers participating in a trust network,
/// referenced indirectly by rule targets ending in `issuers.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerList {
    #[serde(rename = "participating_issuers")]
    pub participating_issuers: Vec<IssuerRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerRef {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
