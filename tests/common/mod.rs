#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shc_validator::config::{Mode, ValidatorConfig};
use shc_validator::directory::{IssuerDirectory, KeyDirectory, SigningKey};
use shc_validator::model::{
    IssuerList, IssuerRef, RevocationListResponse, RuleDocument, RuleSet, Scalar, VaccineRule,
};
use shc_validator::net::{FetchError, FetchResult, TrustFetcher};

/// Scripted stand-in for the network layer with call counting, so tests
/// can assert fetch de-duplication and short-circuits.
#[derive(Default)]
pub struct ScriptedFetcher {
    rule_document: Mutex<Option<RuleDocument>>,
    issuer_lists: Mutex<HashMap<String, IssuerList>>,
    revocations: Mutex<HashMap<(String, String), RevocationOutcome>>,
    rule_fetches: AtomicUsize,
    issuer_fetches: AtomicUsize,
    revocation_fetches: AtomicUsize,
    /// Simulated network latency, used to hold fetches open while
    /// concurrent callers pile up.
    pub delay: Option<Duration>,
}

pub enum RevocationOutcome {
    List(RevocationListResponse),
    NotFound,
    Unreachable,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_rule_document(&self, document: Option<RuleDocument>) {
        *self.rule_document.lock().unwrap() = document;
    }

    pub fn set_issuer_list(&self, url: &str, list: IssuerList) {
        self.issuer_lists.lock().unwrap().insert(url.to_string(), list);
    }

    pub fn set_revocation(&self, issuer: &str, kid: &str, outcome: RevocationOutcome) {
        self.revocations
            .lock()
            .unwrap()
            .insert((issuer.to_string(), kid.to_string()), outcome);
    }

    pub fn rule_fetches(&self) -> usize {
        self.rule_fetches.load(Ordering::SeqCst)
    }

    pub fn issuer_fetches(&self) -> usize {
        self.issuer_fetches.load(Ordering::SeqCst)
    }

    pub fn revocation_fetches(&self) -> usize {
        self.revocation_fetches.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TrustFetcher for ScriptedFetcher {
    async fn fetch_rule_document(&self) -> FetchResult<RuleDocument> {
        self.rule_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        match self.rule_document.lock().unwrap().clone() {
            Some(document) => Ok(document),
            None => Err(FetchError::Status(500)),
        }
    }

    async fn fetch_issuer_list(&self, url: &str) -> FetchResult<IssuerList> {
        self.issuer_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        match self.issuer_lists.lock().unwrap().get(url).cloned() {
            Some(list) => Ok(list),
            None => Err(FetchError::Status(500)),
        }
    }

    async fn fetch_revocation_list(
        &self,
        issuer: &str,
        kid: &str,
    ) -> FetchResult<RevocationListResponse> {
        self.revocation_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let guard = self.revocations.lock().unwrap();
        match guard.get(&(issuer.to_string(), kid.to_string())) {
            Some(RevocationOutcome::List(response)) => Ok(response.clone()),
            Some(RevocationOutcome::NotFound) => Err(FetchError::NotFound),
            Some(RevocationOutcome::Unreachable) => Err(FetchError::Timeout),
            None => Err(FetchError::Status(500)),
        }
    }
}

/// In-memory key/issuer directory collaborator.
#[derive(Default)]
pub struct StaticDirectory {
    issuers: Mutex<Option<Vec<String>>>,
    keys: Mutex<HashMap<String, Vec<SigningKey>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_issuers(&self, issuers: Vec<&str>) {
        *self.issuers.lock().unwrap() =
            Some(issuers.into_iter().map(str::to_string).collect());
    }

    pub fn set_keys(&self, issuer: &str, keys: Vec<SigningKey>) {
        self.keys.lock().unwrap().insert(issuer.to_string(), keys);
    }
}

#[async_trait]
impl IssuerDirectory for StaticDirectory {
    async fn participating_issuers(&self) -> Option<Vec<String>> {
        self.issuers.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyDirectory for StaticDirectory {
    async fn active_signing_keys(&self, issuer: &str) -> Option<Vec<SigningKey>> {
        self.keys.lock().unwrap().get(issuer).cloned()
    }
}

pub fn signing_key(kid: &str, ctr: Option<&str>) -> SigningKey {
    SigningKey {
        kid: kid.to_string(),
        ctr: ctr.map(|value| Scalar::String(value.to_string())),
    }
}

pub fn test_config(cache_dir: &Path) -> ValidatorConfig {
    let mut config = ValidatorConfig::for_mode(Mode::Test);
    config.cache.directory = cache_dir.to_path_buf();
    config
}

pub fn rule_set_for(target: &str) -> RuleSet {
    RuleSet {
        rule_target: target.to_string(),
        version: "2.0".into(),
        mix_types_allowed: true,
        mix_types_required_doses: 2,
        required_doses: 2,
        interval_required: true,
        min_days_between_doses: 28,
        vaccine_rules: vec![VaccineRule {
            cvx_code: "208".into(),
            dose_type: 1,
            dose_count: 1,
            min_days: None,
        }],
        exemptions: None,
        cache: None,
    }
}

pub fn rule_document_with(targets: &[&str]) -> RuleDocument {
    RuleDocument {
        published_at: "2021-10-13T00:00:00Z".into(),
        rule_sets: targets.iter().map(|target| rule_set_for(target)).collect(),
    }
}

pub fn issuer_list_of(issuers: &[&str]) -> IssuerList {
    IssuerList {
        participating_issuers: issuers
            .iter()
            .map(|iss| IssuerRef {
                iss: iss.to_string(),
                name: None,
            })
            .collect(),
    }
}

pub fn revocation_response(
    kid: &str,
    ctr: Option<&str>,
    rids: &[&str],
) -> RevocationListResponse {
    RevocationListResponse {
        kid: kid.to_string(),
        method: "rid".into(),
        ctr: ctr.map(|value| Scalar::String(value.to_string())),
        rids: rids.iter().map(|rid| rid.to_string()).collect(),
    }
}
