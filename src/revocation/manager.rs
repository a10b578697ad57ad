use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ValidatorConfig;
use crate::directory::{IssuerDirectory, KeyDirectory, SigningKey};
use crate::issuer;
use crate::model::{RevocationData, RevocationListResponse, Scalar};
use crate::net::TrustFetcher;
use crate::rules::RulesManager;
use crate::storage::CacheRepository;
use crate::sync::SharedMap;

use super::coordinator::{FetchCoordinator, FetchKey};

const CRL_GROUP: &str = "crl";

/// Owns the per-issuer, per-signing-key revocation lists: point-in-time
/// revocation queries against the in-memory dataset, and a gated,
/// de-duplicated fan-out refresh that keeps it current.
pub struct RevocationManager {
    config: Arc<ValidatorConfig>,
    fetcher: Arc<dyn TrustFetcher>,
    cache: Arc<dyn CacheRepository>,
    rules: Arc<RulesManager>,
    issuers: Arc<dyn IssuerDirectory>,
    keys: Arc<dyn KeyDirectory>,
    /// Current revocation entries, replaced wholesale per key so a stale
    /// counter never survives a list update.
    dataset: SharedMap<FetchKey, RevocationData>,
    coordinator: FetchCoordinator,
    /// Keys whose CRL endpoint recently returned 404, with the instant
    /// the absence was observed.
    not_found: SharedMap<FetchKey, DateTime<Utc>>,
}

impl RevocationManager {
    pub async fn new(
        config: Arc<ValidatorConfig>,
        fetcher: Arc<dyn TrustFetcher>,
        cache: Arc<dyn CacheRepository>,
        rules: Arc<RulesManager>,
        issuers: Arc<dyn IssuerDirectory>,
        keys: Arc<dyn KeyDirectory>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            config,
            fetcher,
            cache,
            rules,
            issuers,
            keys,
            dataset: SharedMap::new(),
            coordinator: FetchCoordinator::new(),
            not_found: SharedMap::new(),
        });
        manager.seed_local_data().await;
        manager
    }

    /// Whether the credential identified by `rid` is revoked for this
    /// `(issuer, kid)` pair. Opportunistically triggers a background
    /// refresh, then answers synchronously from the current cache: an id
    /// carrying a cutoff timestamp revokes only credentials issued
    /// strictly before that moment; an id without one revokes
    /// unconditionally.
    pub fn is_revoked(
        self: &Arc<Self>,
        issuer_id: &str,
        issued_at: DateTime<Utc>,
        rid: &str,
        kid: &str,
    ) -> bool {
        self.spawn_refresh();

        let key = (issuer::file_path_safe_name(issuer_id), kid.to_string());
        self.dataset
            .read_with(&key, |data| {
                if !data.rids.contains(rid) {
                    return false;
                }
                match data.revocation_expiry.get(rid) {
                    Some(cutoff) => issued_at < *cutoff,
                    None => true,
                }
            })
            .unwrap_or(false)
    }

    fn spawn_refresh(self: &Arc<Self>) {
        if !self.config.remote_rules {
            return;
        }
        // Outside a runtime (owner tearing down) the trigger is a no-op.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let manager = Arc::clone(self);
            handle.spawn(async move {
                let _ = manager.refresh_if_needed().await;
            });
        }
    }

    /// Fans out one gated fetch per `(issuer, key)` pair across every
    /// participating issuer and joins them all; the aggregate result is
    /// true only when every individual fetch succeeded.
    pub async fn refresh_if_needed(self: &Arc<Self>) -> bool {
        if !self.config.remote_rules {
            return false;
        }
        let Some(issuers) = self.issuers.participating_issuers().await else {
            warn!("no participating issuers available");
            return false;
        };

        let mut join_set = JoinSet::new();
        for issuer_id in issuers {
            let manager = Arc::clone(self);
            join_set.spawn(async move { manager.refresh_issuer(&issuer_id).await });
        }

        let mut all_ok = true;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(ok) => all_ok &= ok,
                Err(err) => {
                    warn!(%err, "issuer refresh task failed to complete");
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    async fn refresh_issuer(self: &Arc<Self>, issuer_id: &str) -> bool {
        // No key material for the issuer means nothing to refresh.
        let Some(keys) = self.keys.active_signing_keys(issuer_id).await else {
            return true;
        };
        self.prune_stale_keys(issuer_id, &keys).await;

        let mut join_set = JoinSet::new();
        for key in keys {
            let manager = Arc::clone(self);
            let issuer_id = issuer_id.to_string();
            join_set.spawn(async move {
                let kid = key.kid.clone();
                let ok = manager.refresh_key(&issuer_id, key).await;
                if ok {
                    debug!(issuer = %issuer_id, %kid, "revocation list refresh settled");
                } else {
                    warn!(issuer = %issuer_id, %kid, "revocation list refresh failed");
                }
                ok
            });
        }

        let mut all_ok = true;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(ok) => all_ok &= ok,
                Err(err) => {
                    warn!(%err, "key refresh task failed to complete");
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    /// One gated fetch for `(issuer, kid)`. In order: skip while a fetch
    /// for the key is in flight; skip inside the negative-cache cooldown;
    /// skip when the directory's counter token matches the cached entry;
    /// without a counter, skip while the saved-at marker is inside the
    /// TTL window. Every skip is a success from the aggregate's point of
    /// view.
    async fn refresh_key(self: &Arc<Self>, issuer_id: &str, key: SigningKey) -> bool {
        let issuer_safe = issuer::file_path_safe_name(issuer_id);
        let cache_key: FetchKey = (issuer_safe.clone(), key.kid.clone());

        if key.kid.is_empty() || self.coordinator.is_fetching(&cache_key) {
            return true;
        }

        if let Some(observed_at) = self.not_found.get(&cache_key)
            && !negative_cooldown_elapsed(
                observed_at,
                self.rules.revocations_ttl_minutes(),
                Utc::now(),
            )
        {
            return true;
        }

        if let Some(ctr) = key.ctr.as_ref().map(Scalar::raw_value) {
            // An unchanged counter means the cached list is current.
            let cached_ctr = self
                .dataset
                .read_with(&cache_key, |data| data.ctr.clone())
                .flatten();
            if cached_ctr.as_deref() == Some(ctr.as_str()) {
                return true;
            }
        } else if let Some(saved_at) = self
            .cache
            .read_marker(&issuer_group(&issuer_safe), &crl_file(&key.kid))
            .await
        {
            let ttl = ttl_duration(self.rules.revocations_ttl_minutes());
            if Utc::now() <= saved_at + ttl {
                return true;
            }
        }

        if !self.coordinator.begin(cache_key.clone()) {
            return true;
        }
        let outcome = self.fetch_and_ingest(issuer_id, &issuer_safe, &key.kid).await;
        self.coordinator.finish(&cache_key);
        outcome
    }

    async fn fetch_and_ingest(
        self: &Arc<Self>,
        issuer_id: &str,
        issuer_safe: &str,
        kid: &str,
    ) -> bool {
        let cache_key: FetchKey = (issuer_safe.to_string(), kid.to_string());
        match self.fetcher.fetch_revocation_list(issuer_id, kid).await {
            Ok(response) => {
                self.ingest(issuer_safe, &response).await;
                self.not_found.remove(&cache_key);
                true
            }
            Err(err) if err.is_not_found() => {
                // No list published. Existing revocation data stays: the
                // absence of a list is not evidence of no revocations.
                info!(issuer = %issuer_id, %kid, "revocation endpoint not published");
                self.not_found.insert(cache_key, Utc::now());
                true
            }
            Err(crate::net::FetchError::Status(status)) => {
                // A response was observed, just not a useful one.
                warn!(issuer = %issuer_id, %kid, status, "revocation fetch rejected");
                self.not_found.remove(&cache_key);
                false
            }
            Err(crate::net::FetchError::Decode(err)) => {
                warn!(issuer = %issuer_id, %kid, %err, "revocation response undecodable");
                self.not_found.remove(&cache_key);
                false
            }
            Err(err) => {
                // Timeout or transport failure: no response was observed,
                // so neither the cache nor the negative cache moves.
                warn!(issuer = %issuer_id, %kid, %err, "revocation fetch failed");
                false
            }
        }
    }

    /// Replaces the cached entry for the response's key wholesale and
    /// persists the raw response next to its saved-at marker.
    async fn ingest(&self, issuer_safe: &str, response: &RevocationListResponse) {
        let data = RevocationData::from(response);
        self.dataset
            .insert((issuer_safe.to_string(), response.kid.clone()), data);

        match serde_json::to_vec(response) {
            Ok(bytes) => {
                if let Err(err) = self
                    .cache
                    .write(&issuer_group(issuer_safe), &crl_file(&response.kid), &bytes)
                    .await
                {
                    warn!(%err, issuer = issuer_safe, kid = %response.kid, "persisting revocation list failed");
                }
            }
            Err(err) => {
                warn!(%err, kid = %response.kid, "encoding revocation list failed");
            }
        }
    }

    /// Drops cache entries and on-disk artifacts for keys the issuer no
    /// longer lists, so rotated keys do not accumulate.
    async fn prune_stale_keys(&self, issuer_id: &str, keys: &[SigningKey]) {
        let issuer_safe = issuer::file_path_safe_name(issuer_id);
        let group = issuer_group(&issuer_safe);
        let valid: HashSet<&str> = keys.iter().map(|key| key.kid.as_str()).collect();

        for file in self.cache.list(&group).await.unwrap_or_default() {
            let kid = file.strip_suffix(".json").unwrap_or(&file);
            if valid.contains(kid) {
                continue;
            }
            info!(issuer = %issuer_safe, %kid, "removing revocation data for rotated key");
            if let Err(err) = self.cache.remove(&group, &file).await {
                warn!(%err, %kid, "removing stale revocation file failed");
            }
        }

        self.dataset
            .retain(|(entry_issuer, kid), _| entry_issuer != &issuer_safe || valid.contains(kid.as_str()));
    }

    /// Loads every persisted revocation list back into memory, keyed by
    /// the response's own kid. Undecodable files are skipped.
    async fn seed_local_data(&self) {
        for issuer_dir in self.cache.list_groups(CRL_GROUP).await.unwrap_or_default() {
            let group = issuer_group(&issuer_dir);
            for file in self.cache.list(&group).await.unwrap_or_default() {
                let Ok(Some(bytes)) = self.cache.read(&group, &file).await else {
                    continue;
                };
                match serde_json::from_slice::<RevocationListResponse>(&bytes) {
                    Ok(response) => {
                        self.dataset.insert(
                            (issuer_dir.clone(), response.kid.clone()),
                            RevocationData::from(&response),
                        );
                    }
                    Err(err) => {
                        warn!(%err, %file, "cached revocation list is malformed, skipping");
                    }
                }
            }
        }
        if !self.dataset.is_empty() {
            debug!(entries = self.dataset.len(), "seeded revocation data from cache");
        }
    }
}

fn issuer_group(issuer_safe: &str) -> String {
    format!("{CRL_GROUP}/{issuer_safe}")
}

fn crl_file(kid: &str) -> String {
    format!("{kid}.json")
}

fn ttl_duration(ttl_minutes: f64) -> Duration {
    Duration::seconds((ttl_minutes * 60.0) as i64)
}

/// A 404 observed at `observed_at` suppresses fetches until the
/// revocation TTL elapses; a fetch at exactly the boundary is permitted.
fn negative_cooldown_elapsed(
    observed_at: DateTime<Utc>,
    ttl_minutes: f64,
    now: DateTime<Utc>,
) -> bool {
    now >= observed_at + ttl_duration(ttl_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let observed = Utc::now();
        let ttl_minutes = 5.0;

        assert!(!negative_cooldown_elapsed(
            observed,
            ttl_minutes,
            observed + Duration::seconds(299)
        ));
        // Exactly at the boundary a fetch is permitted again.
        assert!(negative_cooldown_elapsed(
            observed,
            ttl_minutes,
            observed + Duration::seconds(300)
        ));
        assert!(negative_cooldown_elapsed(
            observed,
            ttl_minutes,
            observed + Duration::seconds(301)
        ));
    }
}
