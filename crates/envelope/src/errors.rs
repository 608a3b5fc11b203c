//! The typed error taxonomy.
//!
//! [`MeshError`] is what every outbound call returns on failure and what the
//! inbound boundary renders back into HTTP. Each variant carries the
//! [`HttpStatus`] it maps to and the [`ErrorEnvelope`] that goes on the wire;
//! callers dispatch on the variant with `match` rather than on a type
//! hierarchy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::codes;
use crate::{ErrorDetails, ErrorEnvelope, HttpStatus};

/// Boxed underlying cause (a transport error, a decoder error, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Error kind
// ---------------------------------------------------------------------------

/// Status classification of a [`MeshError`], without its payload.
///
/// Useful as a structured logging field and for tests that only care about
/// which branch of the taxonomy was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ClientError,
    ServerError,
    ConnectionError,
    ValidationError,
    UnknownError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::ConnectionError => "connection_error",
            Self::ValidationError => "validation_error",
            Self::UnknownError => "unknown_error",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// MeshError
// ---------------------------------------------------------------------------

/// Errors produced by the outbound request layer and consumed by the inbound
/// boundary.
///
/// The `status` of every variant is decided by the constructor and never
/// recomputed.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A remote peer answered with a `4xx`: the caller's request was rejected.
    #[error("Remote peer rejected the request with status {status}: {envelope}")]
    ClientError {
        /// The `4xx` status the peer answered with.
        status: HttpStatus,
        /// The peer's envelope, or a fallback built from its raw body.
        envelope: ErrorEnvelope,
    },

    /// A remote peer answered with a `5xx`: the peer failed.
    #[error("Remote peer failed with status {status}: {envelope}")]
    ServerError {
        /// The `5xx` status the peer answered with.
        status: HttpStatus,
        /// The peer's envelope, or a fallback built from its raw body.
        envelope: ErrorEnvelope,
    },

    /// No response was obtained at all (refused, reset, timed out, no instance).
    ///
    /// Distinct from [`MeshError::ServerError`] so callers can tell "reached
    /// the peer and got an error" from "never reached the peer".
    #[error("Remote peer unreachable: {envelope}")]
    ConnectionError {
        /// Always `502 Bad Gateway`.
        status: HttpStatus,
        /// `REMOTE_SERVICE_UNAVAILABLE` with a description of the failure.
        envelope: ErrorEnvelope,
        /// The transport error, when there was one.
        source: Option<BoxError>,
    },

    /// Locally detected malformed input. The request was never sent.
    #[error("Invalid request: {envelope}")]
    ValidationError {
        /// Always `400 Bad Request`.
        status: HttpStatus,
        /// Describes what is wrong with the request.
        envelope: ErrorEnvelope,
    },

    /// The condition could not be classified, or an unexpected defect occurred.
    #[error("Unknown error with status {status}: {envelope}")]
    UnknownError {
        /// The peer's status when one was received, `502` for an undecodable
        /// answer, otherwise `500`.
        status: HttpStatus,
        /// The envelope rendered to callers.
        envelope: ErrorEnvelope,
        /// The underlying defect, when there was one.
        source: Option<BoxError>,
    },
}

impl MeshError {
    // -- constructors -------------------------------------------------------

    /// A `4xx` answer from a peer.
    pub fn client(status: HttpStatus, envelope: ErrorEnvelope) -> Self {
        Self::ClientError { status, envelope }
    }

    /// A `5xx` answer from a peer.
    pub fn server(status: HttpStatus, envelope: ErrorEnvelope) -> Self {
        Self::ServerError { status, envelope }
    }

    /// Classifies an error answer by its status family.
    ///
    /// `4xx` → [`MeshError::ClientError`], `5xx` → [`MeshError::ServerError`],
    /// anything else → [`MeshError::UnknownError`] keeping `status` as given.
    pub fn from_status(status: HttpStatus, envelope: ErrorEnvelope) -> Self {
        if status.is_client_error() {
            Self::client(status, envelope)
        } else if status.is_server_error() {
            Self::server(status, envelope)
        } else {
            Self::UnknownError {
                status,
                envelope,
                source: None,
            }
        }
    }

    /// The peer could not be reached. Maps to `502 Bad Gateway`.
    pub fn connection(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::ConnectionError {
            status: HttpStatus::BAD_GATEWAY,
            envelope: ErrorEnvelope::new(message, codes::REMOTE_SERVICE_UNAVAILABLE),
            source,
        }
    }

    /// Local input validation failed. Maps to `400 Bad Request`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            status: HttpStatus::BAD_REQUEST,
            envelope: ErrorEnvelope::from_status(HttpStatus::BAD_REQUEST, message),
        }
    }

    /// Local input validation failed on one or more named fields.
    pub fn validation_with_details(message: impl Into<String>, details: ErrorDetails) -> Self {
        Self::ValidationError {
            status: HttpStatus::BAD_REQUEST,
            envelope: ErrorEnvelope::from_status(HttpStatus::BAD_REQUEST, message)
                .with_details(details),
        }
    }

    /// An unclassified failure carrying `envelope`. Maps to `500`.
    pub fn unknown(envelope: ErrorEnvelope) -> Self {
        Self::UnknownError {
            status: HttpStatus::INTERNAL_SERVER_ERROR,
            envelope,
            source: None,
        }
    }

    /// The generic unknown-error envelope with a recorded cause. Maps to `500`.
    pub fn unknown_with_source(source: BoxError) -> Self {
        Self::UnknownError {
            status: HttpStatus::INTERNAL_SERVER_ERROR,
            envelope: ErrorEnvelope::unknown(),
            source: Some(source),
        }
    }

    /// The presented credentials were rejected. Maps to `401`.
    pub fn token_invalid() -> Self {
        Self::client(HttpStatus::UNAUTHORIZED, ErrorEnvelope::token_invalid())
    }

    /// A requested resource does not exist. Maps to `404`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::client(
            HttpStatus::NOT_FOUND,
            ErrorEnvelope::from_status(HttpStatus::NOT_FOUND, message),
        )
    }

    /// Converts an envelope back into its taxonomy member.
    ///
    /// Numeric `4xx`/`5xx` codes classify by family; [`codes::TOKEN_INVALID`]
    /// is a `401` client error; [`codes::REMOTE_SERVICE_UNAVAILABLE`] is a
    /// connection error; everything else is an unknown error with status `500`.
    pub fn from_envelope(envelope: ErrorEnvelope) -> Self {
        if let Some(status) = envelope.code().as_status().filter(|s| s.is_error()) {
            return Self::from_status(status, envelope);
        }
        if envelope.code().is(codes::TOKEN_INVALID) {
            return Self::client(HttpStatus::UNAUTHORIZED, envelope);
        }
        if envelope.code().is(codes::REMOTE_SERVICE_UNAVAILABLE) {
            return Self::ConnectionError {
                status: HttpStatus::BAD_GATEWAY,
                envelope,
                source: None,
            };
        }
        Self::unknown(envelope)
    }

    /// Attaches an underlying cause to variants that can carry one.
    ///
    /// Variants without a cause slot are returned unchanged.
    #[must_use]
    pub fn with_source(self, cause: BoxError) -> Self {
        match self {
            Self::ConnectionError {
                status, envelope, ..
            } => Self::ConnectionError {
                status,
                envelope,
                source: Some(cause),
            },
            Self::UnknownError {
                status, envelope, ..
            } => Self::UnknownError {
                status,
                envelope,
                source: Some(cause),
            },
            other => other,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClientError { .. } => ErrorKind::ClientError,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::ConnectionError { .. } => ErrorKind::ConnectionError,
            Self::ValidationError { .. } => ErrorKind::ValidationError,
            Self::UnknownError { .. } => ErrorKind::UnknownError,
        }
    }

    /// The HTTP status this error is rendered with at a service boundary.
    pub fn status(&self) -> HttpStatus {
        match self {
            Self::ClientError { status, .. }
            | Self::ServerError { status, .. }
            | Self::ConnectionError { status, .. }
            | Self::ValidationError { status, .. }
            | Self::UnknownError { status, .. } => *status,
        }
    }

    pub fn envelope(&self) -> &ErrorEnvelope {
        match self {
            Self::ClientError { envelope, .. }
            | Self::ServerError { envelope, .. }
            | Self::ConnectionError { envelope, .. }
            | Self::ValidationError { envelope, .. }
            | Self::UnknownError { envelope, .. } => envelope,
        }
    }

    pub fn into_envelope(self) -> ErrorEnvelope {
        match self {
            Self::ClientError { envelope, .. }
            | Self::ServerError { envelope, .. }
            | Self::ConnectionError { envelope, .. }
            | Self::ValidationError { envelope, .. }
            | Self::UnknownError { envelope, .. } => envelope,
        }
    }

    /// Shorthand for `self.envelope().message()`.
    pub fn message(&self) -> &str {
        self.envelope().message()
    }
}
