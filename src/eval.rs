//! Rule evaluation over a decoded credential: exemption and expiry
//! checks, plus the dose/interval primitives the top-level validation
//! orchestrator composes into full sequence matching.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::model::payload::Resource;
use crate::model::{DecodedPayload, RuleSet, VaccineRule};

/// Whether the credential carries an active medical exemption under the
/// rule set, evaluated at the current instant.
pub fn is_exempt(payload: &DecodedPayload, rule_set: &RuleSet) -> bool {
    is_exempt_at(payload, rule_set, Utc::now())
}

/// Exemption check at an explicit instant. Condition entries qualify
/// when the credential issuer matches an exemption rule's issuer and the
/// entry's coding systems *and* codes both intersect the rule's
/// allow-lists; a qualifying entry is active when `now` falls within
/// `[onset, abatement]`. A missing onset or abatement defaults to `now`
/// itself, so an entry with only an onset date is active for exactly the
/// evaluation instant.
pub fn is_exempt_at(payload: &DecodedPayload, rule_set: &RuleSet, now: DateTime<Utc>) -> bool {
    let Some(exemptions) = rule_set.exemptions.as_ref() else {
        return false;
    };
    let credential_issuer = normalize_token(&payload.iss);
    let Some(exemption) = exemptions
        .iter()
        .find(|rule| normalize_token(&rule.issuer) == credential_issuer)
    else {
        return false;
    };

    let allowed_systems: Vec<String> = exemption
        .coding_systems
        .iter()
        .map(|system| normalize_token(system))
        .collect();
    let allowed_codes: Vec<String> = exemption
        .codes
        .iter()
        .map(|code| normalize_token(code))
        .collect();

    payload
        .conditions()
        .into_iter()
        .filter(|condition| {
            let coding = condition
                .code
                .as_ref()
                .map(|concept| concept.coding.as_slice())
                .unwrap_or_default();
            let systems: Vec<String> = coding
                .iter()
                .filter_map(|entry| entry.system.as_deref())
                .map(normalize_token)
                .collect();
            let codes: Vec<String> = coding
                .iter()
                .filter_map(|entry| entry.code.as_deref())
                .map(normalize_token)
                .collect();

            allowed_systems.iter().any(|system| systems.contains(system))
                && allowed_codes.iter().any(|code| codes.contains(code))
        })
        .any(|condition| within_exemption_window(condition, now))
}

fn within_exemption_window(condition: &Resource, now: DateTime<Utc>) -> bool {
    let onset = condition
        .onset_date_time
        .as_deref()
        .and_then(parse_fhir_date)
        .unwrap_or(now);
    let abatement = condition
        .abatement_date_time
        .as_deref()
        .and_then(parse_fhir_date)
        .unwrap_or(now);
    now >= onset && now <= abatement
}

/// True iff the credential carries an expiry and it is strictly in the
/// past. A credential without `exp` never expires.
pub fn is_expired(payload: &DecodedPayload) -> bool {
    is_expired_at(payload, Utc::now())
}

pub fn is_expired_at(payload: &DecodedPayload, now: DateTime<Utc>) -> bool {
    match payload.expires_at() {
        Some(expires_at) => expires_at < now,
        None => false,
    }
}

/// The vaccine rule matching a dose's CVX code, if the rule set knows
/// the product.
pub fn vaccine_rule_for<'a>(rule_set: &'a RuleSet, cvx_code: &str) -> Option<&'a VaccineRule> {
    let code = cvx_code.trim();
    rule_set.vaccine_rules.iter().find(|rule| rule.cvx_code == code)
}

/// Doses required under the rule set for a single-product or mixed
/// series.
pub fn required_doses(rule_set: &RuleSet, mixed_types: bool) -> u32 {
    if mixed_types && rule_set.mix_types_allowed {
        rule_set.mix_types_required_doses
    } else {
        rule_set.required_doses
    }
}

/// Effective minimum days between doses for a matched vaccine rule:
/// the rule's own `minDays` when present, else the set-wide interval
/// when one is required at all. `None` means no constraint, which is
/// distinct from an explicit zero.
pub fn min_days_between(rule_set: &RuleSet, rule: &VaccineRule) -> Option<i64> {
    match &rule.min_days {
        Some(value) => value.as_i64(),
        None => rule_set
            .interval_required
            .then_some(i64::from(rule_set.min_days_between_doses)),
    }
}

pub fn interval_satisfied(
    previous_dose: DateTime<Utc>,
    current_dose: DateTime<Utc>,
    min_days: Option<i64>,
) -> bool {
    match min_days {
        Some(days) => current_dose - previous_dose >= Duration::days(days),
        None => true,
    }
}

fn normalize_token(value: &str) -> String {
    value.trim().to_lowercase()
}

/// FHIR date strings arrive as full RFC 3339 instants or as bare
/// `YYYY-MM-DD` dates; the latter are read as UTC midnight.
pub fn parse_fhir_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}
