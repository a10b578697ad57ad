//! Construction wiring: builds the stores over shared collaborators and
//! exposes the validation-facing surface of the trust engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::directory::{IssuerDirectory, KeyDirectory};
use crate::eval;
use crate::events::TrustEventBus;
use crate::model::{DecodedPayload, RuleDocument, RuleSet};
use crate::net::TrustFetcher;
use crate::revocation::RevocationManager;
use crate::rules::RulesManager;
use crate::storage::{CacheRepository, FileCacheRepository};

/// One isolated trust-engine instance. Everything it needs arrives at
/// construction; multiple engines with different configs can coexist in
/// one process.
pub struct TrustEngine {
    config: Arc<ValidatorConfig>,
    rules: Arc<RulesManager>,
    revocations: Arc<RevocationManager>,
}

impl TrustEngine {
    pub async fn new(
        config: ValidatorConfig,
        fetcher: Arc<dyn TrustFetcher>,
        issuers: Arc<dyn IssuerDirectory>,
        keys: Arc<dyn KeyDirectory>,
    ) -> Self {
        let config = Arc::new(config);
        let cache: Arc<dyn CacheRepository> = Arc::new(FileCacheRepository::new(
            config.cache.directory.clone(),
            config.cache.seed_directory.clone(),
        ));
        Self::with_repository(config, fetcher, cache, issuers, keys).await
    }

    /// Full-control constructor for embedding and tests.
    pub async fn with_repository(
        config: Arc<ValidatorConfig>,
        fetcher: Arc<dyn TrustFetcher>,
        cache: Arc<dyn CacheRepository>,
        issuers: Arc<dyn IssuerDirectory>,
        keys: Arc<dyn KeyDirectory>,
    ) -> Self {
        let events = TrustEventBus::new();
        let rules = RulesManager::new(
            Arc::clone(&config),
            Arc::clone(&fetcher),
            Arc::clone(&cache),
            events.clone(),
        )
        .await;
        let revocations = RevocationManager::new(
            Arc::clone(&config),
            fetcher,
            cache,
            Arc::clone(&rules),
            issuers,
            keys,
        )
        .await;

        // Updated rules (and the issuer lists behind them) invalidate
        // downstream revocation material; re-check it on every update.
        let mut updates = events.subscribe();
        let refresh_target = Arc::downgrade(&revocations);
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(event) => {
                        // A dead upgrade means the engine is gone.
                        let Some(manager) = refresh_target.upgrade() else {
                            break;
                        };
                        debug!(?event, "trust material updated, re-checking revocations");
                        let _ = manager.refresh_if_needed().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let engine = Self {
            config,
            rules,
            revocations,
        };
        engine.warm_up();
        engine
    }

    /// Seeds and freshens trust material in the background, mirroring
    /// app start: rules first, then the revocation lists that depend on
    /// them.
    fn warm_up(&self) {
        if !self.config.remote_rules {
            return;
        }
        let _ = self.rules.rule_document();
        let revocations = Arc::clone(&self.revocations);
        tokio::spawn(async move {
            let _ = revocations.refresh_if_needed().await;
        });
    }

    pub fn rule_document(&self) -> Option<Arc<RuleDocument>> {
        self.rules.rule_document()
    }

    pub fn resolve_rule_set_for(&self, issuer_id: &str, fallback_to_host: bool) -> Option<RuleSet> {
        self.rules.resolve_rule_set_for(issuer_id, fallback_to_host)
    }

    pub fn is_revoked(
        &self,
        issuer_id: &str,
        issued_at: DateTime<Utc>,
        rid: &str,
        kid: &str,
    ) -> bool {
        self.revocations.is_revoked(issuer_id, issued_at, rid, kid)
    }

    pub fn is_exempt(&self, payload: &DecodedPayload, rule_set: &RuleSet) -> bool {
        eval::is_exempt(payload, rule_set)
    }

    pub fn is_expired(&self, payload: &DecodedPayload) -> bool {
        eval::is_expired(payload)
    }

    /// Explicit rule refresh; concurrent callers share one fetch.
    pub async fn refresh_rules(&self) -> Option<Arc<RuleDocument>> {
        self.rules.refresh().await
    }

    /// Explicit revocation refresh across all issuers and keys; true only
    /// when every per-key fetch succeeded.
    pub async fn refresh_revocations(&self) -> bool {
        self.revocations.refresh_if_needed().await
    }

    pub fn rules(&self) -> &Arc<RulesManager> {
        &self.rules
    }

    pub fn revocations(&self) -> &Arc<RevocationManager> {
        &self.revocations
    }
}
