//! [`BoundaryError`]: every failure a handler can surface, and how each one is
//! rendered as an HTTP response.
//!
//! | Variant | Status | Envelope |
//! |---------|--------|----------|
//! | `Mesh` | the error's own status | the error's own envelope |
//! | `Validation` | 400 | "Validation failed", field → message details |
//! | `MalformedBody` / `BadParameter` | 400 | the rejection text |
//! | `TokenInvalid` | 401 | `TOKEN_INVALID` |
//! | `NotFound` | 404 | the message |
//! | `MethodNotAllowed` | 405 | method and allowed methods |
//! | `DependencyUnreachable` | 502 | `REMOTE_SERVICE_UNAVAILABLE` |
//! | `Unhandled` | 500 | generic `UNKNOWN_ERROR`; the cause is only logged |

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{debug, error, warn};
use validator::{ValidationErrors, ValidationErrorsKind};

use envelope::{codes, ErrorDetails, ErrorEnvelope, HttpStatus, MeshError};

/// Message of the envelope produced for field validation failures.
pub const VALIDATION_FAILED: &str = "Validation failed";

// ---------------------------------------------------------------------------
// Field violations
// ---------------------------------------------------------------------------

/// Field-level validation failures, keyed by field path.
///
/// Nested fields use dotted paths (`route.origin.lat`); list elements use an
/// index (`stops[2].name`). A field with several failures lists every message,
/// separated by `"; "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldViolations(BTreeMap<String, String>);

impl FieldViolations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        self.0
            .entry(field.into())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&message);
            })
            .or_insert(message);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_details(&self) -> ErrorDetails {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn collect(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(failures) => {
                    for failure in failures {
                        let message = failure
                            .message
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| format!("failed '{}' validation", failure.code));
                        self.add(path.clone(), message);
                    }
                }
                ValidationErrorsKind::Struct(nested) => self.collect(&path, nested),
                ValidationErrorsKind::List(items) => {
                    for (index, nested) in items {
                        self.collect(&format!("{path}[{index}]"), nested);
                    }
                }
            }
        }
    }
}

impl From<&ValidationErrors> for FieldViolations {
    fn from(errors: &ValidationErrors) -> Self {
        let mut violations = Self::new();
        violations.collect("", errors);
        violations
    }
}

// ---------------------------------------------------------------------------
// BoundaryError
// ---------------------------------------------------------------------------

/// Errors rendered at an inbound HTTP boundary.
///
/// Handlers return `Result<_, BoundaryError>` and use `?` on [`MeshError`],
/// `anyhow::Error`, axum extractor rejections, and `validator` results.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// A failed outbound call, re-emitted with its original status and envelope.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// One or more fields of the request failed declarative validation.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldViolations),

    /// The request body could not be parsed.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// A path or query parameter is missing or has the wrong type.
    #[error("Bad request parameter: {0}")]
    BadParameter(String),

    /// The caller's credentials were rejected.
    #[error("The token you have provided is invalid.")]
    TokenInvalid,

    /// No resource or route matches the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The route exists but does not accept this method.
    #[error("{}", method_not_allowed_message(.method, .allowed))]
    MethodNotAllowed {
        /// The method the caller used.
        method: String,
        /// Methods the route does accept, in the order advertised.
        allowed: Vec<String>,
    },

    /// A downstream dependency could not be reached.
    #[error("A depending service is unavailable: {0}")]
    DependencyUnreachable(String),

    /// Anything else. Rendered generically; the cause never reaches the caller.
    #[error("Unhandled error: {0:#}")]
    Unhandled(anyhow::Error),
}

fn method_not_allowed_message(method: &str, allowed: &[String]) -> String {
    format!(
        "Request method '{method}' not supported. Allowed methods are: [{}]",
        allowed.join(", ")
    )
}

impl BoundaryError {
    /// The status this error is rendered with.
    pub fn status(&self) -> HttpStatus {
        match self {
            Self::Mesh(err) => err.status(),
            Self::Validation(_) | Self::MalformedBody(_) | Self::BadParameter(_) => {
                HttpStatus::BAD_REQUEST
            }
            Self::TokenInvalid => HttpStatus::UNAUTHORIZED,
            Self::NotFound(_) => HttpStatus::NOT_FOUND,
            Self::MethodNotAllowed { .. } => HttpStatus::METHOD_NOT_ALLOWED,
            Self::DependencyUnreachable(_) => HttpStatus::BAD_GATEWAY,
            Self::Unhandled(_) => HttpStatus::INTERNAL_SERVER_ERROR,
        }
    }

    /// The envelope placed in the response body.
    pub fn into_envelope(self) -> ErrorEnvelope {
        let status = self.status();
        match self {
            Self::Mesh(err) => err.into_envelope(),
            Self::Validation(violations) => {
                ErrorEnvelope::from_status(status, VALIDATION_FAILED)
                    .with_details(violations.to_details())
            }
            Self::MalformedBody(message)
            | Self::BadParameter(message)
            | Self::NotFound(message) => ErrorEnvelope::from_status(status, message),
            Self::TokenInvalid => ErrorEnvelope::token_invalid(),
            Self::MethodNotAllowed { method, allowed } => {
                ErrorEnvelope::from_status(status, method_not_allowed_message(&method, &allowed))
            }
            Self::DependencyUnreachable(message) => ErrorEnvelope::new(
                format!("A depending service is unavailable: {message}"),
                codes::REMOTE_SERVICE_UNAVAILABLE,
            ),
            Self::Unhandled(_) => ErrorEnvelope::unknown(),
        }
    }

    fn log(&self) {
        match self {
            Self::Unhandled(cause) => error!(error = ?cause, "Unhandled error at service boundary"),
            _ if self.status().is_server_error() => {
                warn!(status = self.status().as_u16(), error = %self, "Request failed")
            }
            _ => debug!(status = self.status().as_u16(), error = %self, "Request rejected"),
        }
    }
}

impl IntoResponse for BoundaryError {
    fn into_response(self) -> Response {
        self.log();
        let status = StatusCode::from_u16(self.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.into_envelope())).into_response()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<anyhow::Error> for BoundaryError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<MeshError>() {
            Ok(mesh) => Self::Mesh(mesh),
            Err(other) => Self::Unhandled(other),
        }
    }
}

impl From<ValidationErrors> for BoundaryError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(FieldViolations::from(&errors))
    }
}

impl From<FieldViolations> for BoundaryError {
    fn from(violations: FieldViolations) -> Self {
        Self::Validation(violations)
    }
}

impl From<JsonRejection> for BoundaryError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl From<QueryRejection> for BoundaryError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadParameter(rejection.body_text())
    }
}

impl From<PathRejection> for BoundaryError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadParameter(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use envelope::ErrorCode;
    use serde_json::json;
    use validator::ValidationError;

    use super::*;

    #[test]
    fn statuses_follow_the_mapping_table() {
        let cases = [
            (BoundaryError::MalformedBody("x".into()), 400),
            (BoundaryError::BadParameter("x".into()), 400),
            (BoundaryError::TokenInvalid, 401),
            (BoundaryError::NotFound("x".into()), 404),
            (
                BoundaryError::MethodNotAllowed {
                    method: "DELETE".into(),
                    allowed: vec!["GET".into()],
                },
                405,
            ),
            (BoundaryError::DependencyUnreachable("x".into()), 502),
            (BoundaryError::Unhandled(anyhow::anyhow!("boom")), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status().as_u16(), expected, "{err}");
        }
    }

    #[test]
    fn mesh_errors_keep_their_status_and_envelope() {
        let remote = ErrorEnvelope::new("Trip not found", "TRIP_NOT_FOUND").with_detail("tripId", "7");
        let err = BoundaryError::from(MeshError::client(HttpStatus::NOT_FOUND, remote.clone()));
        assert_eq!(err.status(), HttpStatus::NOT_FOUND);
        assert_eq!(err.into_envelope(), remote);
    }

    #[test]
    fn method_not_allowed_lists_the_allowed_methods() {
        let envelope = BoundaryError::MethodNotAllowed {
            method: "POST".into(),
            allowed: vec!["GET".into(), "HEAD".into()],
        }
        .into_envelope();
        assert_eq!(
            envelope.message(),
            "Request method 'POST' not supported. Allowed methods are: [GET, HEAD]"
        );
        assert_eq!(envelope.code(), &ErrorCode::Numeric(405));
    }

    #[test]
    fn dependency_unreachable_uses_the_well_known_code() {
        let envelope = BoundaryError::DependencyUnreachable("billing-service".into()).into_envelope();
        assert_eq!(envelope.message(), "A depending service is unavailable: billing-service");
        assert!(envelope.code().is(codes::REMOTE_SERVICE_UNAVAILABLE));
    }

    #[test]
    fn unhandled_errors_never_leak_their_cause() {
        let envelope =
            BoundaryError::from(anyhow::anyhow!("db password is hunter2")).into_envelope();
        assert_eq!(envelope, ErrorEnvelope::unknown());
    }

    #[test]
    fn anyhow_wrapping_a_mesh_error_is_unwrapped() {
        let err = BoundaryError::from(anyhow::Error::new(MeshError::token_invalid()));
        assert_eq!(err.status(), HttpStatus::UNAUTHORIZED);
    }

    #[test]
    fn validation_errors_are_flattened_per_field() {
        let mut errors = ValidationErrors::new();
        let mut lat = ValidationError::new("range");
        lat.message = Some("latitude must be between -90 and 90".into());
        errors.add("lat", lat);
        errors.add("lon", ValidationError::new("range"));

        let envelope = BoundaryError::from(errors).into_envelope();
        assert_eq!(envelope.message(), VALIDATION_FAILED);
        assert_eq!(envelope.code(), &ErrorCode::Numeric(400));
        assert_eq!(
            envelope.details().get("lat"),
            Some(&json!("latitude must be between -90 and 90"))
        );
        assert_eq!(
            envelope.details().get("lon"),
            Some(&json!("failed 'range' validation"))
        );
    }

    #[test]
    fn repeated_field_failures_are_joined() {
        let mut violations = FieldViolations::new();
        violations.add("name", "must not be empty");
        violations.add("name", "must be ASCII");
        assert_eq!(violations.get("name"), Some("must not be empty; must be ASCII"));
        assert_eq!(violations.len(), 1);
    }
}
