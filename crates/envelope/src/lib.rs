//! Error domain for meshgate.
//!
//! This crate owns the shapes that cross service boundaries: the
//! `{message, code, details}` envelope, the HTTP status value type, and the
//! [`MeshError`] taxonomy that every outbound call fails with. The `client`
//! crate produces these values; the `boundary` crate renders them.
//!
//! ## Architectural Layer
//!
//! **Domain types.** This crate has no I/O dependencies and no HTTP library
//! types. It defines *what* an error is; infrastructure crates decide *how* it
//! travels.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`envelope`] | `ErrorEnvelope`, `ErrorCode`, `ErrorDetails`, well-known codes |
//! | [`status`] | `HttpStatus` newtype and status-family predicates |
//! | [`errors`] | `MeshError` taxonomy and `ErrorKind` |

pub mod envelope;
pub mod errors;
pub mod status;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use envelope::{
    codes, messages, ErrorCode, ErrorDetails, ErrorEnvelope, REMOTE_ERROR_MESSAGE_KEY,
};
pub use errors::{BoxError, ErrorKind, MeshError};
pub use status::HttpStatus;
