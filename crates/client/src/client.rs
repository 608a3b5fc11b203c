//! The long-lived client that owns the adapter registry and both transports.

use std::sync::Arc;

use reqwest::Method;
use tracing::info;

use crate::adapter::{AdapterRegistry, RequestAdapter};
use crate::builder::RequestBuilder;
use crate::builtin::{CorrelationIdAdapter, HostDenyListAdapter, InternalCredentialsAdapter};
use crate::config::{ClientConfig, ConfigError};
use crate::translator::{ErrorParser, ErrorTranslator};
use crate::transport::{
    DirectExecutor, HttpExecutor, LoadBalancedExecutor, ServiceRegistry, StaticServiceRegistry,
    Transport,
};

/// Entry point for outbound calls.
///
/// Cheap to clone; clones share the same adapters and connection pools. The
/// adapter registry is fixed when the client is built.
#[derive(Clone)]
pub struct MeshClient {
    inner: Arc<Inner>,
}

struct Inner {
    adapters: AdapterRegistry,
    translator: ErrorTranslator,
    direct: Arc<dyn HttpExecutor>,
    load_balanced: Arc<dyn HttpExecutor>,
}

impl MeshClient {
    pub fn builder() -> MeshClientBuilder {
        MeshClientBuilder::default()
    }

    /// A builder pre-loaded from `config`: HTTP timeouts, the static service
    /// registry, and the stock adapters in this order: correlation id (if
    /// enabled), host deny list (if non-empty), internal credentials (if
    /// configured).
    ///
    /// Further adapters may be registered on the returned builder; they run
    /// after the stock ones.
    pub fn builder_from_config(config: &ClientConfig) -> Result<MeshClientBuilder, ConfigError> {
        let mut builder = MeshClientBuilder::default()
            .http_client(config.http_client()?)
            .service_registry(config.service_registry()?);

        if config.correlation_ids {
            builder = builder.adapter(CorrelationIdAdapter);
        }
        if !config.denied_hosts.is_empty() {
            builder = builder.adapter(HostDenyListAdapter::new(&config.denied_hosts));
        }
        if let Some(credentials) = &config.internal_credentials {
            builder = builder.adapter(InternalCredentialsAdapter::new(credentials.clone()));
        }
        Ok(builder)
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url.into())
    }

    /// A `GET` request with no target yet; set one with `.uri(..)`.
    pub fn new_request(&self) -> RequestBuilder {
        self.request(Method::GET, String::new())
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.inner.adapters
    }

    /// Turns `4xx`/`5xx` answers into [`envelope::MeshError`]s.
    pub fn translator(&self) -> &ErrorTranslator {
        &self.inner.translator
    }

    /// The executor that handles `transport`.
    pub fn executor(&self, transport: Transport) -> &dyn HttpExecutor {
        match transport {
            Transport::Direct => self.inner.direct.as_ref(),
            Transport::LoadBalanced => self.inner.load_balanced.as_ref(),
        }
    }
}

impl std::fmt::Debug for MeshClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshClient")
            .field("adapters", &self.inner.adapters)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MeshClientBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`MeshClient`]. The only place adapters can be registered.
#[derive(Default)]
pub struct MeshClientBuilder {
    adapters: AdapterRegistry,
    translator: ErrorTranslator,
    http: Option<reqwest::Client>,
    registry: Option<Arc<dyn ServiceRegistry>>,
    direct: Option<Arc<dyn HttpExecutor>>,
    load_balanced: Option<Arc<dyn HttpExecutor>>,
}

impl MeshClientBuilder {
    /// Appends an adapter after those registered so far.
    pub fn adapter<A: RequestAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapters.register(adapter);
        self
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn RequestAdapter>) -> Self {
        self.adapters.register_shared(adapter);
        self
    }

    /// Appends a decoder for error bodies that do not follow the standard
    /// envelope. Parsers are tried in registration order before the standard
    /// decoding; the first one returning an envelope wins.
    pub fn error_parser<P: ErrorParser + 'static>(mut self, parser: P) -> Self {
        self.translator = self.translator.with_parser(Arc::new(parser));
        self
    }

    /// The `reqwest` client used by the default executors.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Where the default load-balanced executor looks up service instances.
    pub fn service_registry<R: ServiceRegistry + 'static>(mut self, registry: R) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Replaces the executor for direct requests.
    pub fn direct_executor<E: HttpExecutor + 'static>(mut self, executor: E) -> Self {
        self.direct = Some(Arc::new(executor));
        self
    }

    /// Replaces the executor for load-balanced requests.
    pub fn load_balanced_executor<E: HttpExecutor + 'static>(mut self, executor: E) -> Self {
        self.load_balanced = Some(Arc::new(executor));
        self
    }

    pub fn build(self) -> Result<MeshClient, ConfigError> {
        let http = match self.http {
            Some(http) => http,
            None => ClientConfig::default().http_client()?,
        };
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(StaticServiceRegistry::new()));

        let direct = self
            .direct
            .unwrap_or_else(|| Arc::new(DirectExecutor::new(http.clone())));
        let load_balanced = self
            .load_balanced
            .unwrap_or_else(|| Arc::new(LoadBalancedExecutor::new(http, registry)));

        info!(
            adapters = ?self.adapters,
            error_parsers = self.translator.parser_count(),
            "mesh client ready"
        );
        Ok(MeshClient {
            inner: Arc::new(Inner {
                adapters: self.adapters,
                translator: self.translator,
                direct,
                load_balanced,
            }),
        })
    }
}

impl std::fmt::Debug for MeshClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshClientBuilder")
            .field("adapters", &self.adapters)
            .finish_non_exhaustive()
    }
}
