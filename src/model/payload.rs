use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded claims of a SMART-Health-Card style credential: issuer,
/// issuance/expiry instants, and the embedded FHIR bundle. Signature
/// verification has already happened by the time this type exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub iss: String,
    /// Issuance instant, seconds since the Unix epoch (RFC 7519 `nbf`).
    pub nbf: f64,
    /// Expiration instant, seconds since the Unix epoch (RFC 7519 `exp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
    pub vc: VerifiableCredential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub credential_subject: CredentialSubject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSubject {
    pub fhir_version: String,
    pub fhir_bundle: FhirBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirBundle {
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: String,
    pub entry: Vec<BundleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Resource,
}

/// Union of the resource shapes a credential bundle carries: Patient,
/// Immunization and Condition entries all decode into this one struct,
/// discriminated by `resource_type`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Vec<HumanName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccine_code: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer: Option<Vec<Performer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResourceMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abatement_date_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeableConcept {
    pub coding: Vec<Coding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientReference {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityLabel>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DecodedPayload {
    pub fn fhir_bundle(&self) -> &FhirBundle {
        &self.vc.credential_subject.fhir_bundle
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.nbf as i64, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp as i64, 0))
    }

    pub fn immunizations(&self) -> Vec<&Resource> {
        self.resources_of_type("Immunization")
    }

    pub fn conditions(&self) -> Vec<&Resource> {
        self.resources_of_type("Condition")
    }

    fn resources_of_type(&self, resource_type: &str) -> Vec<&Resource> {
        self.fhir_bundle()
            .entry
            .iter()
            .map(|entry| &entry.resource)
            .filter(|resource| resource.resource_type.eq_ignore_ascii_case(resource_type))
            .collect()
    }

    /// Display name from the bundle's Patient entry, given names first.
    pub fn full_name(&self) -> String {
        let Some(name) = self
            .fhir_bundle()
            .entry
            .first()
            .and_then(|entry| entry.resource.name.as_ref())
            .and_then(|names| names.first())
        else {
            return String::new();
        };

        let mut full_name = String::new();
        for given in name.given.iter().flatten() {
            if !full_name.is_empty() {
                full_name.push(' ');
            }
            full_name.push_str(given);
        }
        if let Some(family) = &name.family {
            if !full_name.is_empty() {
                full_name.push(' ');
            }
            full_name.push_str(family);
        }
        full_name
    }

    pub fn birth_date(&self) -> Option<&str> {
        self.fhir_bundle()
            .entry
            .first()
            .and_then(|entry| entry.resource.birth_date.as_deref())
    }
}
