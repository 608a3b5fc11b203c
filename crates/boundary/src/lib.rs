//! Inbound error boundary for meshgate services.
//!
//! Any axum handler that returns `Result<_, BoundaryError>` answers failures
//! with the same `{message, code, details}` envelope that outbound calls
//! decode. A [`envelope::MeshError`] received from a downstream peer therefore
//! passes through a service unchanged: same status, same code, same details.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All `axum` and `validator` types live here. The
//! [`envelope`] crate supplies the domain error shapes.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`error`] | `BoundaryError`, `FieldViolations`, `IntoResponse` rendering |
//! | [`extract`] | `ValidatedJson<T>` extractor |
//! | [`middleware`] | `layer`, `normalize_method_not_allowed`, `fallback_not_found` |

pub mod error;
pub mod extract;
pub mod middleware;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use error::{BoundaryError, FieldViolations, VALIDATION_FAILED};
pub use extract::ValidatedJson;
pub use middleware::{fallback_not_found, layer, normalize_method_not_allowed};
