//! Outbound request layer for meshgate.
//!
//! Callers build requests through a [`MeshClient`]:
//!
//! ```no_run
//! # async fn run() -> Result<(), envelope::MeshError> {
//! let client = client::MeshClient::builder().build().expect("client");
//! let invoice: serde_json::Value = client
//!     .get("http://billing-service/invoices/42")
//!     .token("caller-token")
//!     .send_json()
//!     .await?;
//! # let _ = invoice;
//! # Ok(())
//! # }
//! ```
//!
//! Every request passes through the client's [`RequestAdapter`]s exactly once,
//! is dispatched to a direct or load-balanced [`HttpExecutor`] depending on the
//! shape of its host, and fails with a [`envelope::MeshError`] whose envelope
//! preserves the remote peer's diagnostics.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate owns every `reqwest` type in the workspace.
//! The [`envelope`] crate supplies the error shapes it produces.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | `MeshClient`, `MeshClientBuilder` |
//! | [`builder`] | `RequestBuilder<S>` and its `Building`/`Adapted` states |
//! | [`request`] | `OutboundRequest`, the value adapters edit |
//! | [`adapter`] | `RequestAdapter` trait and `AdapterRegistry` |
//! | [`builtin`] | Correlation-id, internal-credentials, and host deny-list adapters |
//! | [`credentials`] | `Credentials` and credential header names |
//! | [`transport`] | Host classification, `HttpExecutor`, direct and load-balanced executors |
//! | [`translator`] | `ErrorTranslator` and `ErrorParser`: error response → `MeshError` |
//! | [`response`] | `MeshResponse` |
//! | [`template`] | `UriVariables`: `{name}` placeholder expansion |
//! | [`config`] | `ClientConfig`, `ConfigError` |

pub mod adapter;
pub mod builder;
pub mod builtin;
pub mod client;
pub mod config;
pub mod credentials;
pub mod request;
pub mod response;
pub mod template;
pub mod translator;
pub mod transport;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use adapter::{AdapterRegistry, RequestAdapter};
pub use builder::{Adapted, AdapterState, Building, RequestBuilder};
pub use builtin::{
    CorrelationIdAdapter, HostDenyListAdapter, InternalCredentialsAdapter, CORRELATION_ID_HEADER,
};
pub use client::{MeshClient, MeshClientBuilder};
pub use config::{ClientConfig, ConfigError};
pub use credentials::{
    Credentials, CREDENTIALS_HEADER, SECRET_HEADER, TOKEN_HEADER, USER_ID_HEADER,
};
pub use request::OutboundRequest;
pub use response::MeshResponse;
pub use template::UriVariables;
pub use translator::{ErrorParser, ErrorTranslator};
pub use transport::{
    classify_host, resolve, DirectExecutor, HttpExecutor, LoadBalancedExecutor, ServiceRegistry,
    StaticServiceRegistry, Transport,
};

pub use reqwest::header::HeaderMap;
pub use reqwest::{Method, Url};
