use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ValidatorConfig;
use crate::events::{TrustEvent, TrustEventBus};
use crate::issuer;
use crate::model::{CacheExpiry, IssuerList, RuleDocument, RuleSet};
use crate::net::TrustFetcher;
use crate::storage::CacheRepository;
use crate::sync::{SharedList, SharedMap};

const RULES_GROUP: &str = "rules";

/// Owns the jurisdiction rule document: local-first reads, scheduled
/// re-acquisition, and rule-set resolution per issuer.
pub struct RulesManager {
    config: Arc<ValidatorConfig>,
    fetcher: Arc<dyn TrustFetcher>,
    cache: Arc<dyn CacheRepository>,
    events: TrustEventBus,
    /// Current authoritative document; replaced wholesale, never patched.
    current: RwLock<Option<Arc<RuleDocument>>>,
    /// Single process-wide freshness deadline for the rules class, set
    /// only by a successful fetch.
    expires_at: RwLock<Option<DateTime<Utc>>>,
    /// Issuer lists backing indirect rule targets, keyed by the target's
    /// filesystem-safe name.
    issuer_lists: SharedMap<String, Arc<IssuerList>>,
    /// Completions of callers that arrived while a fetch was in flight;
    /// all fire together with the single outcome. Pushes and drains
    /// happen under the `updating` lock so no waiter is orphaned.
    refresh_waiters: SharedList<oneshot::Sender<Option<Arc<RuleDocument>>>>,
    updating: Mutex<bool>,
}

impl RulesManager {
    pub async fn new(
        config: Arc<ValidatorConfig>,
        fetcher: Arc<dyn TrustFetcher>,
        cache: Arc<dyn CacheRepository>,
        events: TrustEventBus,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            config,
            fetcher,
            cache,
            events,
            current: RwLock::new(None),
            expires_at: RwLock::new(None),
            issuer_lists: SharedMap::new(),
            refresh_waiters: SharedList::new(),
            updating: Mutex::new(false),
        });
        manager.load_local_state().await;
        manager
    }

    fn rules_file(&self) -> &'static str {
        match self.config.mode {
            crate::config::Mode::Prod => "rules.json",
            crate::config::Mode::Test => "rules-test.json",
            crate::config::Mode::Dev => "rules-dev.json",
        }
    }

    /// Freshest locally available document: cache, else bundled seed.
    /// A stale or missing freshness deadline triggers a background
    /// refresh, but the read returns immediately.
    pub fn rule_document(self: &Arc<Self>) -> Option<Arc<RuleDocument>> {
        if self.needs_refresh() {
            self.spawn_refresh();
        }
        self.current_document()
    }

    /// Pure read of the in-memory document; never triggers network work.
    pub fn current_document(&self) -> Option<Arc<RuleDocument>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves the rule set applying to `issuer`. Matching runs against
    /// normalized identifiers; indirect (issuer-list) targets project to
    /// their cached participating issuers, and unresolvable indirections
    /// are excluded rather than failing the lookup. With
    /// `fallback_to_host` set and the queried issuer being the global
    /// issuer, a lowercase host-substring match against the raw targets
    /// is the last resort.
    pub fn resolve_rule_set_for(&self, issuer_id: &str, fallback_to_host: bool) -> Option<RuleSet> {
        let document = self.current_document()?;
        let normalized = issuer::normalize(issuer_id);

        for rule_set in &document.rule_sets {
            let resolved = self.resolve_rule_target(&rule_set.rule_target);
            if resolved.iter().any(|candidate| *candidate == normalized) {
                return Some(rule_set.clone());
            }
        }

        if fallback_to_host
            && normalized == issuer::normalize(&self.config.endpoints.global_issuer)
            && let Ok(parsed) = Url::parse(issuer_id.trim())
            && let Some(host) = parsed.host_str()
        {
            let host = host.to_lowercase();
            for rule_set in &document.rule_sets {
                if rule_set.rule_target.to_lowercase().contains(&host) {
                    return Some(rule_set.clone());
                }
            }
        }
        None
    }

    /// Projects a rule target to the normalized issuers it covers.
    fn resolve_rule_target(&self, rule_target: &str) -> Vec<String> {
        let trimmed = rule_target.trim();
        if trimmed.contains(issuer::WELL_KNOWN_JWKS_SUFFIX) {
            // Direct issuer reference.
            return vec![issuer::normalize(trimmed)];
        }
        if !trimmed.contains("issuers.json") {
            // Bare issuer URL; the well-known suffix is implied.
            return vec![issuer::normalize(trimmed)];
        }
        let safe_name = issuer::file_path_safe_name(trimmed);
        match self.issuer_lists.get(&safe_name) {
            Some(list) => list
                .participating_issuers
                .iter()
                .map(|entry| issuer::normalize(&entry.iss))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Triggers a refresh unless one is already in flight and awaits the
    /// shared outcome. Returns the new document on success, `None` on any
    /// failure (existing cache stays untouched either way).
    pub async fn refresh(self: &Arc<Self>) -> Option<Arc<RuleDocument>> {
        if !self.config.remote_rules {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let start_worker = {
            let mut updating = self
                .updating
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.refresh_waiters.push(tx);
            if *updating {
                false
            } else {
                *updating = true;
                true
            }
        };

        if start_worker {
            let manager = Arc::clone(self);
            tokio::spawn(async move { manager.run_refresh().await });
        }
        rx.await.unwrap_or(None)
    }

    fn spawn_refresh(self: &Arc<Self>) {
        if !self.config.remote_rules {
            return;
        }
        // Outside a runtime (owner tearing down) the trigger is a no-op.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let manager = Arc::clone(self);
            handle.spawn(async move {
                let _ = manager.refresh().await;
            });
        }
    }

    async fn run_refresh(self: Arc<Self>) {
        debug!("updating rules");
        let outcome = match self.fetcher.fetch_rule_document().await {
            Ok(document) => Some(self.apply_remote_document(document).await),
            Err(err) => {
                warn!(%err, "rule document fetch failed, keeping cached rules");
                None
            }
        };

        let waiters = {
            let mut updating = self
                .updating
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *updating = false;
            self.refresh_waiters.drain_all()
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn apply_remote_document(&self, document: RuleDocument) -> Arc<RuleDocument> {
        let document = Arc::new(document);

        match serde_json::to_vec(&*document) {
            Ok(bytes) => {
                if let Err(err) = self.cache.write(RULES_GROUP, self.rules_file(), &bytes).await {
                    warn!(%err, "persisting rule document failed");
                }
            }
            Err(err) => warn!(%err, "encoding rule document failed"),
        }

        self.store_rule_targets(&document).await;
        self.install_document(Arc::clone(&document), true);
        info!(published_at = %document.published_at, "rule document updated");
        self.events.publish(TrustEvent::RulesUpdated);
        document
    }

    /// Replaces the in-memory document; on a successful remote fetch the
    /// freshness deadline is recomputed from the new document's own cache
    /// policy (else the mode default).
    fn install_document(&self, document: Arc<RuleDocument>, from_remote: bool) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(document);
        if from_remote {
            let ttl_minutes = self.rules_ttl_minutes();
            let deadline = Utc::now() + Duration::seconds((ttl_minutes * 60.0) as i64);
            *self
                .expires_at
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(deadline);
        }
    }

    fn needs_refresh(&self) -> bool {
        match *self
            .expires_at
            .read()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(deadline) => Utc::now() > deadline,
            // No successful fetch yet this process.
            None => true,
        }
    }

    /// Persists the issuer list behind every indirect rule target:
    /// network first, bundled seed only when nothing is on disk yet.
    async fn store_rule_targets(&self, document: &RuleDocument) {
        let mut any_updated = false;
        for rule_set in &document.rule_sets {
            let target = rule_set.rule_target.trim();
            if target.contains(issuer::WELL_KNOWN_JWKS_SUFFIX) {
                continue;
            }
            if !target.contains("issuers.json") {
                continue;
            }
            let safe_name = issuer::file_path_safe_name(target);
            match self.fetcher.fetch_issuer_list(target).await {
                Ok(list) => {
                    self.persist_issuer_list(&safe_name, &list).await;
                    self.issuer_lists.insert(safe_name, Arc::new(list));
                    any_updated = true;
                }
                Err(err) => {
                    warn!(%err, url = %target, "issuer list fetch failed");
                    if !self.cache.exists(RULES_GROUP, &safe_name).await
                        && let Some(list) = self.read_issuer_list_seed(&safe_name).await
                    {
                        self.persist_issuer_list(&safe_name, &list).await;
                        self.issuer_lists.insert(safe_name, Arc::new(list));
                        any_updated = true;
                    }
                }
            }
        }
        if any_updated {
            self.events.publish(TrustEvent::IssuersUpdated);
        }
    }

    async fn persist_issuer_list(&self, safe_name: &str, list: &IssuerList) {
        match serde_json::to_vec(list) {
            Ok(bytes) => {
                if let Err(err) = self.cache.write(RULES_GROUP, safe_name, &bytes).await {
                    warn!(%err, safe_name, "persisting issuer list failed");
                }
            }
            Err(err) => warn!(%err, safe_name, "encoding issuer list failed"),
        }
    }

    async fn read_issuer_list_seed(&self, safe_name: &str) -> Option<IssuerList> {
        let bytes = self.cache.read_seed(RULES_GROUP, safe_name).await.ok()??;
        match serde_json::from_slice(&bytes) {
            Ok(list) => Some(list),
            Err(err) => {
                warn!(%err, safe_name, "bundled issuer list is malformed");
                None
            }
        }
    }

    /// Loads the cached document (else the bundled seed) and every cached
    /// issuer-list file into memory. Decode failures are cache misses.
    async fn load_local_state(&self) {
        if let Some(document) = self.read_document_tier().await {
            self.install_document(Arc::new(document), false);
        }

        let files = self.cache.list(RULES_GROUP).await.unwrap_or_default();
        let rules_file = self.rules_file();
        for file in files {
            if file == rules_file {
                continue;
            }
            if let Ok(Some(bytes)) = self.cache.read(RULES_GROUP, &file).await {
                match serde_json::from_slice::<IssuerList>(&bytes) {
                    Ok(list) => {
                        self.issuer_lists.insert(file, Arc::new(list));
                    }
                    Err(err) => warn!(%err, %file, "cached issuer list is malformed, skipping"),
                }
            }
        }
    }

    async fn read_document_tier(&self) -> Option<RuleDocument> {
        let file = self.rules_file();

        if let Ok(Some(bytes)) = self.cache.read(RULES_GROUP, file).await {
            match serde_json::from_slice(&bytes) {
                Ok(document) => return Some(document),
                Err(err) => warn!(%err, "cached rule document is malformed, trying seed"),
            }
        }

        debug!("seeding rules");
        let bytes = match self.cache.read_seed(RULES_GROUP, file).await {
            Ok(Some(bytes)) => bytes,
            _ => return None,
        };
        match serde_json::from_slice::<RuleDocument>(&bytes) {
            Ok(document) => {
                // Persist the seed so later runs start from the cache tier.
                if let Ok(encoded) = serde_json::to_vec(&document)
                    && let Err(err) = self.cache.write(RULES_GROUP, file, &encoded).await
                {
                    warn!(%err, "persisting seeded rule document failed");
                }
                Some(document)
            }
            Err(err) => {
                warn!(%err, "bundled rule document is malformed");
                None
            }
        }
    }

    pub fn rules_ttl_minutes(&self) -> f64 {
        self.cache_policy_minutes(
            |expiry| expiry.rules,
            self.config.default_rules_ttl_minutes(),
        )
    }

    pub fn issuers_ttl_minutes(&self) -> f64 {
        self.cache_policy_minutes(
            |expiry| expiry.issuers,
            self.config.default_issuers_ttl_minutes(),
        )
    }

    pub fn revocations_ttl_minutes(&self) -> f64 {
        self.cache_policy_minutes(
            |expiry| expiry.revocations,
            self.config.default_revocations_ttl_minutes(),
        )
    }

    /// TTLs come from the global issuer's rule set when the current
    /// document carries a cache policy; before any rules exist the mode
    /// default applies (the bootstrapping fallback).
    fn cache_policy_minutes<F>(&self, pick: F, default_minutes: f64) -> f64
    where
        F: Fn(&CacheExpiry) -> f64,
    {
        self.resolve_rule_set_for(&self.config.endpoints.global_issuer, true)
            .and_then(|rule_set| rule_set.cache.map(|policy| pick(&policy.expiry)))
            .unwrap_or(default_minutes)
    }
}
