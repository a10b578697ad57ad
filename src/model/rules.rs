use serde::{Deserialize, Serialize};

use super::scalar::Scalar;

/// Jurisdiction rule document, replaced wholesale on every successful
/// fetch and never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(rename = "publishDateTime")]
    pub published_at: String,
    #[serde(rename = "ruleSet")]
    pub rule_sets: Vec<RuleSet>,
}

/// Vaccination rule set scoped to one rule target (a direct issuer, an
/// issuer-list reference, or a host-level fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "ruleTarget")]
    pub rule_target: String,
    pub version: String,
    #[serde(rename = "mixTypesAllowed")]
    pub mix_types_allowed: bool,
    #[serde(rename = "mixTypesRuRequired")]
    pub mix_types_required_doses: u32,
    #[serde(rename = "ruRequired")]
    pub required_doses: u32,
    #[serde(rename = "intervalRequired")]
    pub interval_required: bool,
    #[serde(rename = "daysSinceLastInterval")]
    pub min_days_between_doses: u32,
    #[serde(rename = "vaccinationRules")]
    pub vaccine_rules: Vec<VaccineRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exemptions: Option<Vec<ExemptionRule>>,
    /// Remote override of the default trust-refresh TTLs, scoped to this
    /// rule document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CachePolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccineRule {
    #[serde(rename = "cvxCode")]
    pub cvx_code: String,
    #[serde(rename = "type")]
    pub dose_type: u32,
    #[serde(rename = "ru")]
    pub dose_count: u32,
    /// Absent means no minimum-interval constraint, which is distinct
    /// from an explicit zero.
    #[serde(rename = "minDays", default, skip_serializing_if = "Option::is_none")]
    pub min_days: Option<Scalar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemptionRule {
    pub issuer: String,
    #[serde(rename = "codingSystems")]
    pub coding_systems: Vec<String>,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    pub expiry: CacheExpiry,
}

/// TTL overrides in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheExpiry {
    pub issuers: f64,
    pub rules: f64,
    pub revocations: f64,
}
