//! HTTP client for the control-plane REST API
//!
//! Issues plain GET requests against `{base}{path}` and decodes list
//! responses into the typed models. The client performs no retries; callers
//! decide what a failure means.

use crate::error::FetchError;
use crate::models::{ResourceKind, ResourceList};
use bytes::Bytes;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Version endpoint used for the startup reachability probe
pub const VERSION_PATH: &str = "/version";

/// Read-only client for the control-plane API
#[derive(Debug, Clone)]
pub struct ResourceClient {
    client: Client,
    base_url: Url,
}

impl ResourceClient {
    /// Create a new client. `timeout` of `None` applies no request deadline.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Paths are appended to the base URL verbatim, keeping any path prefix
    fn url_for(&self, path: &str) -> Result<Url, FetchError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    /// GET a path and return the raw response body
    pub async fn fetch(&self, path: &str) -> Result<Bytes, FetchError> {
        let url = self.url_for(path)?;
        debug!(url = %url, "Fetching control-plane resource");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|source| FetchError::Body {
            path: path.to_string(),
            source,
        })
    }

    /// Fetch and decode the list endpoint of a resource kind
    pub async fn list<T: DeserializeOwned>(&self, kind: ResourceKind) -> Result<Vec<T>, FetchError> {
        let path = kind.list_path();
        let body = self.fetch(path).await?;

        let list: ResourceList<T> =
            serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                path: path.to_string(),
                source,
            })?;

        Ok(list.into_items())
    }

    /// One-shot reachability check against the version endpoint.
    ///
    /// Any HTTP response counts as reachable; only transport failures do not.
    pub async fn probe(&self) -> bool {
        let url = match self.url_for(VERSION_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid control-plane version url");
                return false;
            }
        };

        match self.client.get(url).send().await {
            Ok(response) => {
                info!(
                    base_url = %self.base_url,
                    status = response.status().as_u16(),
                    "Control plane reachable"
                );
                true
            }
            Err(e) => {
                warn!(base_url = %self.base_url, error = %e, "Control plane unreachable");
                false
            }
        }
    }
}
