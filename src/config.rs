use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Operating mode. Production trusts its caches for hours; test and dev
/// modes use minute-scale TTLs so integration runs never wait on
/// production-scale caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Prod,
    Test,
    Dev,
}

const PROD_RULES_URL: &str = "https://pvc.service.yukon.ca/v1/verifier/.well-known/rules.json";
const TEST_RULES_URL: &str = "https://pvc.service.yukon.ca/test/v1/verifier/.well-known/rules.json";
const PROD_ISSUERS_URL: &str = "https://pvc.service.yukon.ca/v1/verifier/.well-known/issuers.json";
const TEST_ISSUERS_URL: &str =
    "https://pvc.service.yukon.ca/test/v1/verifier/.well-known/issuers.json";
const GLOBAL_ISSUER: &str = "https://pvc.service.yukon.ca/issuer";

/// Engine configuration, passed in at construction. Multiple isolated
/// engine instances may run in one process with different configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    pub mode: Mode,
    /// When off, no rule/issuer/revocation fetches happen at all and the
    /// engine serves bundled and previously cached data only.
    pub remote_rules: bool,
    pub endpoints: EndpointConfig,
    pub cache: CacheConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub rules_url: String,
    pub issuers_url: String,
    /// The network-wide default issuer; host-fallback rule matching is
    /// restricted to this identity.
    pub global_issuer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root of the durable cache tree.
    pub directory: PathBuf,
    /// Read-only bundled seed copy, consulted on first run and when the
    /// durable cache is missing or corrupt.
    #[serde(default)]
    pub seed_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Rule and issuer-list requests are small and fail fast.
    pub timeout_secs: u64,
    /// Revocation lists may be large.
    pub crl_timeout_secs: u64,
}

impl ValidatorConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("mode", "prod")?
            .set_default("remote_rules", true)?
            .set_default("endpoints.rules_url", PROD_RULES_URL)?
            .set_default("endpoints.issuers_url", PROD_ISSUERS_URL)?
            .set_default("endpoints.global_issuer", GLOBAL_ISSUER)?
            .set_default("cache.directory", "vaccine-validator-cache")?
            .set_default("network.timeout_secs", 5)?
            .set_default("network.crl_timeout_secs", 20)?
            .add_source(File::with_name("config/validator").required(false));

        // If env_vars is provided, we use it instead of system environment
        // to avoid variable pollution across tests.
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Format: APP_MODE, APP_ENDPOINTS__RULES_URL, ...
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }

    /// Programmatic config with mode-appropriate endpoint defaults, for
    /// embedding and tests.
    pub fn for_mode(mode: Mode) -> Self {
        let (rules_url, issuers_url) = match mode {
            Mode::Prod => (PROD_RULES_URL, PROD_ISSUERS_URL),
            Mode::Test | Mode::Dev => (TEST_RULES_URL, TEST_ISSUERS_URL),
        };
        Self {
            mode,
            remote_rules: true,
            endpoints: EndpointConfig {
                rules_url: rules_url.to_string(),
                issuers_url: issuers_url.to_string(),
                global_issuer: GLOBAL_ISSUER.to_string(),
            },
            cache: CacheConfig {
                directory: PathBuf::from("vaccine-validator-cache"),
                seed_directory: None,
            },
            network: NetworkConfig {
                timeout_secs: 5,
                crl_timeout_secs: 20,
            },
        }
    }

    /// Default rule-document TTL in minutes, applied when the fetched
    /// document carries no cache policy of its own.
    pub fn default_rules_ttl_minutes(&self) -> f64 {
        self.default_ttl_minutes()
    }

    pub fn default_issuers_ttl_minutes(&self) -> f64 {
        self.default_ttl_minutes()
    }

    pub fn default_revocations_ttl_minutes(&self) -> f64 {
        self.default_ttl_minutes()
    }

    fn default_ttl_minutes(&self) -> f64 {
        match self.mode {
            Mode::Prod => 6.0 * 60.0,
            Mode::Test | Mode::Dev => 1.0,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    pub fn crl_request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.crl_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config =
            ValidatorConfig::load_with_sources(Some(HashMap::new())).expect("load config");

        assert_eq!(config.mode, Mode::Prod);
        assert!(config.remote_rules);
        assert_eq!(config.endpoints.rules_url, PROD_RULES_URL);
        assert_eq!(config.network.timeout_secs, 5);
        assert_eq!(config.network.crl_timeout_secs, 20);
        assert!(config.cache.seed_directory.is_none());
        assert_eq!(config.default_rules_ttl_minutes(), 360.0);
    }

    #[test]
    fn env_overrides() {
        let mut env_vars = HashMap::new();
        env_vars.insert("mode".to_string(), "dev".to_string());
        env_vars.insert("remote_rules".to_string(), "false".to_string());
        env_vars.insert(
            "endpoints.rules_url".to_string(),
            "https://rules.example/rules.json".to_string(),
        );

        let config = ValidatorConfig::load_with_sources(Some(env_vars)).expect("load config");

        assert_eq!(config.mode, Mode::Dev);
        assert!(!config.remote_rules);
        assert_eq!(
            config.endpoints.rules_url,
            "https://rules.example/rules.json"
        );
        // Untouched values keep their defaults.
        assert_eq!(config.endpoints.issuers_url, PROD_ISSUERS_URL);
        assert_eq!(config.default_revocations_ttl_minutes(), 1.0);
    }

    #[test]
    fn mode_constructor_picks_matching_endpoints() {
        let test_config = ValidatorConfig::for_mode(Mode::Test);
        assert_eq!(test_config.endpoints.rules_url, TEST_RULES_URL);
        assert_eq!(test_config.default_rules_ttl_minutes(), 1.0);

        let prod_config = ValidatorConfig::for_mode(Mode::Prod);
        assert_eq!(prod_config.endpoints.issuers_url, PROD_ISSUERS_URL);
    }
}
