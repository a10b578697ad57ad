use serde::{Deserialize, Serialize};

/// JSON scalar that may arrive as a string, bool, integer or float.
///
/// Issuer endpoints are inconsistent about the type of the CRL counter
/// token and the `minDays` rule value, so decoding must accept any scalar
/// shape rather than fail the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// Canonical string form, used to compare counter tokens across
    /// responses that switch between `"3"` and `3`.
    pub fn raw_value(&self) -> String {
        match self {
            Scalar::String(value) => value.clone(),
            Scalar::Bool(value) => value.to_string(),
            Scalar::Int(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::String(value) => value.parse().ok(),
            Scalar::Bool(value) => Some(i64::from(*value)),
            Scalar::Int(value) => Some(*value),
            Scalar::Float(value) => Some(*value as i64),
        }
    }
}
