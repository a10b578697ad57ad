//! Network collaborator: fetches rule documents, issuer lists and
//! revocation lists. The engine consumes the [`TrustFetcher`] trait;
//! [`HttpTrustFetcher`] is the production implementation.

pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::config::ValidatorConfig;
use crate::issuer;
use crate::model::{IssuerList, RevocationListResponse, RuleDocument};

pub use error::{FetchError, FetchResult};

#[async_trait]
pub trait TrustFetcher: Send + Sync {
    /// Fetches the remote rule document from the configured endpoint.
    async fn fetch_rule_document(&self) -> FetchResult<RuleDocument>;

    /// Fetches an issuer list from an explicit URL (rule targets carry
    /// their own issuer-list locations).
    async fn fetch_issuer_list(&self, url: &str) -> FetchResult<IssuerList>;

    /// Fetches the revocation list published for `(issuer, kid)`.
    async fn fetch_revocation_list(
        &self,
        issuer: &str,
        kid: &str,
    ) -> FetchResult<RevocationListResponse>;
}

/// Reqwest-backed fetcher. Rule and issuer requests use the short
/// timeout; revocation lists may be large and get the long one.
#[derive(Debug, Clone)]
pub struct HttpTrustFetcher {
    client: Client,
    rules_url: String,
    request_timeout: Duration,
    crl_request_timeout: Duration,
}

impl HttpTrustFetcher {
    pub fn new(config: &ValidatorConfig) -> FetchResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            rules_url: config.endpoints.rules_url.clone(),
            request_timeout: config.request_timeout(),
            crl_request_timeout: config.crl_request_timeout(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, deadline: Duration) -> FetchResult<T> {
        let _ = Url::parse(url)?;
        debug!(%url, "fetching trust document");

        let response = match timeout(deadline, self.client.get(url).send()).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout),
        };

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound),
            status => return Err(FetchError::Status(status.as_u16())),
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl TrustFetcher for HttpTrustFetcher {
    async fn fetch_rule_document(&self) -> FetchResult<RuleDocument> {
        self.get_json(&self.rules_url, self.request_timeout).await
    }

    async fn fetch_issuer_list(&self, url: &str) -> FetchResult<IssuerList> {
        self.get_json(url, self.request_timeout).await
    }

    async fn fetch_revocation_list(
        &self,
        issuer: &str,
        kid: &str,
    ) -> FetchResult<RevocationListResponse> {
        let url = issuer::crl_endpoint(issuer, kid);
        self.get_json(&url, self.crl_request_timeout).await
    }
}
