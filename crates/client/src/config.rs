//! Client configuration and the errors raised while applying it.
//!
//! [`ClientConfig`] is plain serde data. The binary loads it from file and
//! environment; tests construct it directly. Every field has a default, so an
//! empty document is a valid configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::Credentials;
use crate::transport::StaticServiceRegistry;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Settings for one [`crate::MeshClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on establishing a TCP/TLS connection, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Upper bound on a whole request including the body, in milliseconds.
    pub request_timeout_ms: u64,

    /// `User-Agent` sent with every request.
    pub user_agent: String,

    /// Logical service name → instance base URLs, used by the load-balanced
    /// transport. Names are matched case-insensitively.
    pub services: BTreeMap<String, Vec<String>>,

    /// Credentials attached to internal requests that carry none.
    ///
    /// `None` disables the internal-credentials adapter.
    pub internal_credentials: Option<Credentials>,

    /// Hosts that no request may be sent to.
    pub denied_hosts: Vec<String>,

    /// Whether every request gets an `x-request-id` header.
    pub correlation_ids: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: concat!("meshgate/", env!("CARGO_PKG_VERSION")).to_owned(),
            services: BTreeMap::new(),
            internal_credentials: None,
            denied_hosts: Vec::new(),
            correlation_ids: true,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Builds the `reqwest` client shared by both transports.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout())
            .timeout(self.request_timeout())
            .user_agent(self.user_agent.as_str())
            .build()?;
        Ok(client)
    }

    /// Parses [`ClientConfig::services`] into a registry.
    pub fn service_registry(&self) -> Result<StaticServiceRegistry, ConfigError> {
        let mut registry = StaticServiceRegistry::new();
        for (service, urls) in &self.services {
            for raw in urls {
                let url = Url::parse(raw).map_err(|e| ConfigError::InvalidServiceUrl {
                    service: service.clone(),
                    url: raw.clone(),
                    reason: e.to_string(),
                })?;
                if url.host_str().is_none() {
                    return Err(ConfigError::InvalidServiceUrl {
                        service: service.clone(),
                        url: raw.clone(),
                        reason: "URL has no host".to_owned(),
                    });
                }
                registry = registry.with_instance(service, url);
            }
        }
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Problems turning a [`ClientConfig`] into a working client.
///
/// Raised at start-up only; a client never exists with an invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured service instance is not an absolute URL with a host.
    #[error("Service '{service}' has an invalid instance URL '{url}': {reason}")]
    InvalidServiceUrl {
        /// Logical service name the URL was listed under.
        service: String,
        /// The offending value as written in configuration.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying HTTP client could not be constructed (e.g. no TLS backend).
    #[error("HTTP client could not be constructed")]
    HttpClient(#[from] reqwest::Error),
}
