//! Transport selection and the executors behind each transport.
//!
//! Every request is dispatched by one of two executors:
//!
//! - **Direct** — the target host is `localhost`, an IP literal, or a
//!   syntactically valid domain name. The URL is sent as-is.
//! - **Load-balanced** — anything else (e.g. `billing-service`) is treated as a
//!   logical service name and resolved against a [`ServiceRegistry`].
//!
//! Classification is purely syntactic and performed fresh for every request.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use envelope::{codes, BoxError, ErrorEnvelope, HttpStatus, MeshError};

const LOCALHOST: &str = "localhost";

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Which executor handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Direct,
    LoadBalanced,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::LoadBalanced => f.write_str("load_balanced"),
        }
    }
}

/// Classifies a bare host string.
pub fn classify_host(host: &str) -> Transport {
    let host = host.trim_end_matches('.');
    if host.eq_ignore_ascii_case(LOCALHOST) || is_ip_literal(host) || is_valid_domain_name(host) {
        Transport::Direct
    } else {
        Transport::LoadBalanced
    }
}

/// Parses `url` and classifies its host.
///
/// An unparsable URL, or one without a host, is a validation error.
pub fn resolve(url: &str) -> Result<Transport, MeshError> {
    parse_target(url).map(|parsed| classify_url(&parsed))
}

pub(crate) fn parse_target(url: &str) -> Result<Url, MeshError> {
    let parsed = Url::parse(url)
        .map_err(|e| MeshError::validation(format!("Invalid request URL '{url}': {e}")))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(MeshError::validation(format!(
            "Request URL '{url}' has no host"
        )));
    }
    Ok(parsed)
}

pub(crate) fn classify_url(url: &Url) -> Transport {
    url.host_str().map_or(Transport::LoadBalanced, classify_host)
}

fn is_ip_literal(host: &str) -> bool {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse::<IpAddr>().is_ok()
}

/// RFC 1123 host name with at least two labels and an alphabetic top-level label.
fn is_valid_domain_name(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });
    let tld_ok = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic()));
    labels_ok && tld_ok
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Executes one fully built request. Exactly one attempt; no retries.
///
/// Failing to obtain any response is reported as
/// [`MeshError::ConnectionError`]; a transport failure after the peer
/// answered (such as too many redirects) as [`MeshError::UnknownError`]. Error statuses are *not* errors at this
/// level; they are returned as responses and translated by the caller.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, MeshError>;
}

/// Sends requests to the URL they carry.
#[derive(Debug, Clone)]
pub struct DirectExecutor {
    http: reqwest::Client,
}

impl DirectExecutor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpExecutor for DirectExecutor {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, MeshError> {
        send_once(&self.http, request).await
    }
}

pub(crate) async fn send_once(
    http: &reqwest::Client,
    request: reqwest::Request,
) -> Result<reqwest::Response, MeshError> {
    let host = request.url().host_str().unwrap_or_default().to_owned();
    http.execute(request)
        .await
        .map_err(|e| classify_transport_error(&host, e))
}

/// Connect, timeout, and request-phase failures mean no usable answer was
/// obtained. Anything else (redirect loops, undecodable framing) happened
/// after the peer was reached.
fn classify_transport_error(host: &str, e: reqwest::Error) -> MeshError {
    let reason = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_request() {
        "request failed"
    } else {
        let envelope = ErrorEnvelope::new(
            format!("Exchange with {host} failed after the peer answered: {e}"),
            codes::UNKNOWN_ERROR,
        );
        return MeshError::UnknownError {
            status: HttpStatus::BAD_GATEWAY,
            envelope,
            source: Some(Box::new(e) as BoxError),
        };
    };
    MeshError::connection(
        format!("A depending service is unavailable: {host} ({reason})"),
        Some(Box::new(e) as BoxError),
    )
}

// ---------------------------------------------------------------------------

/// Resolves logical service names to concrete base URLs.
pub trait ServiceRegistry: Send + Sync {
    /// Instances of `service`, in a stable order. Empty if unknown.
    fn instances(&self, service: &str) -> Vec<Url>;
}

/// A [`ServiceRegistry`] backed by a fixed table, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceRegistry {
    services: HashMap<String, Vec<Url>>,
}

impl StaticServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance base URL for `service`. Service names are case-insensitive.
    #[must_use]
    pub fn with_instance(mut self, service: &str, base: Url) -> Self {
        self.services
            .entry(service.to_ascii_lowercase())
            .or_default()
            .push(base);
        self
    }
}

impl ServiceRegistry for StaticServiceRegistry {
    fn instances(&self, service: &str) -> Vec<Url> {
        self.services
            .get(&service.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

/// Resolves the request's host as a service name and rewrites the URL to one
/// of its instances, rotating round-robin across calls.
pub struct LoadBalancedExecutor {
    http: reqwest::Client,
    registry: Arc<dyn ServiceRegistry>,
    cursor: AtomicUsize,
}

impl LoadBalancedExecutor {
    pub fn new(http: reqwest::Client, registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            http,
            registry,
            cursor: AtomicUsize::new(0),
        }
    }

    fn rewrite(&self, url: &mut Url) -> Result<(), MeshError> {
        let service = url.host_str().unwrap_or_default().to_owned();
        let instances = self.registry.instances(&service);
        if instances.is_empty() {
            return Err(MeshError::connection(
                format!("A depending service is unavailable: no instance of '{service}' is registered"),
                None,
            ));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % instances.len();
        let base = &instances[index];
        debug!(service = %service, instance = %base, "resolved service instance");

        let invalid = |what: &str| {
            MeshError::validation(format!(
                "Instance '{base}' of service '{service}' has an unusable {what}"
            ))
        };
        url.set_scheme(base.scheme()).map_err(|()| invalid("scheme"))?;
        url.set_host(base.host_str()).map_err(|_| invalid("host"))?;
        url.set_port(base.port()).map_err(|()| invalid("port"))?;

        let prefix = base.path().trim_end_matches('/');
        if !prefix.is_empty() {
            let joined = format!("{prefix}{}", url.path());
            url.set_path(&joined);
        }
        Ok(())
    }
}

#[async_trait]
impl HttpExecutor for LoadBalancedExecutor {
    async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response, MeshError> {
        self.rewrite(request.url_mut())?;
        send_once(&self.http, request).await
    }
}

impl std::fmt::Debug for LoadBalancedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancedExecutor")
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
