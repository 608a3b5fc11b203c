//! The normalized error envelope.
//!
//! [`ErrorEnvelope`] is the single error payload shape used on the wire and
//! inside every [`crate::MeshError`]. Remote error bodies are decoded into it,
//! locally detected failures are synthesised as it, and the inbound boundary
//! re-serialises it unchanged so the information survives one more hop.
//!
//! Wire format (field order is part of the contract):
//!
//! ```json
//! { "message": "...", "code": 503, "details": { "field": "..." } }
//! ```
//!
//! `details` is omitted entirely when there is nothing to report.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::HttpStatus;

// ---------------------------------------------------------------------------
// Well-known codes
// ---------------------------------------------------------------------------

/// Symbolic error codes shared between services in the mesh.
pub mod codes {
    /// The credentials presented with a request were rejected.
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    /// A downstream peer refused the credentials this service forwarded.
    pub const REMOTE_AUTHENTICATION_FAILED: &str = "REMOTE_AUTHENTICATION_FAILED";
    /// A downstream peer could not be reached at all.
    pub const REMOTE_SERVICE_UNAVAILABLE: &str = "REMOTE_SERVICE_UNAVAILABLE";
    /// Nothing more specific is known.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
}

/// Default human-readable messages for the [`codes`].
pub mod messages {
    pub const TOKEN_INVALID: &str = "The token you have provided is invalid.";
    pub const REMOTE_AUTHENTICATION_FAILED: &str = "The authentication at a remote service failed.";
    pub const REMOTE_SERVICE_UNAVAILABLE: &str = "A required remote service is unavailable.";
    pub const UNKNOWN_ERROR: &str = "An unknown error occurred.";
}

/// Details key under which the error translator preserves an undecodable remote body.
pub const REMOTE_ERROR_MESSAGE_KEY: &str = "Remote Error Message";

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable error code: either an HTTP status number or a symbolic name.
///
/// Serialised untagged, so `503` and `"TOKEN_INVALID"` are both valid on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// Numeric code, usually an HTTP status.
    Numeric(i64),
    /// Symbolic code such as [`codes::TOKEN_INVALID`].
    Symbolic(String),
}

impl ErrorCode {
    /// Creates a symbolic code.
    pub fn symbolic(code: impl Into<String>) -> Self {
        Self::Symbolic(code.into())
    }

    /// Interprets the code as an HTTP status.
    ///
    /// Numeric codes and symbolic codes consisting only of digits (some peers
    /// send `"404"`) are accepted; `None` if the value is not a valid status.
    pub fn as_status(&self) -> Option<HttpStatus> {
        match self {
            Self::Numeric(n) => u16::try_from(*n).ok().and_then(HttpStatus::new),
            Self::Symbolic(s) => s.parse::<u16>().ok().and_then(HttpStatus::new),
        }
    }

    /// Returns `true` if this is the symbolic code `name`.
    pub fn is(&self, name: &str) -> bool {
        matches!(self, Self::Symbolic(s) if s == name)
    }
}

impl From<HttpStatus> for ErrorCode {
    fn from(status: HttpStatus) -> Self {
        Self::Numeric(i64::from(status.as_u16()))
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        Self::Numeric(code)
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        Self::Numeric(i64::from(code))
    }
}

impl From<u16> for ErrorCode {
    fn from(code: u16) -> Self {
        Self::Numeric(i64::from(code))
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::Symbolic(code.to_owned())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::Symbolic(code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Symbolic(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorDetails
// ---------------------------------------------------------------------------

/// Structured diagnostics attached to an envelope (field name → violation, or
/// any contextual value).
///
/// Backed by a [`BTreeMap`] so serialised output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorDetails(BTreeMap<String, Value>);

impl ErrorDetails {
    /// Creates an empty detail map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, replacing any previous value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Chaining form of [`ErrorDetails::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ErrorDetails {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, Value>> for ErrorDetails {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// ErrorEnvelope
// ---------------------------------------------------------------------------

/// The normalized `{message, code, details}` error payload.
///
/// Immutable once built: fields are private and the `with_*` helpers consume
/// and return the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable description. Always present.
    message: String,

    /// Machine-readable code.
    code: ErrorCode,

    /// Optional diagnostics; omitted from the wire when empty.
    #[serde(
        default,
        skip_serializing_if = "ErrorDetails::is_empty",
        deserialize_with = "details_or_null"
    )]
    details: ErrorDetails,
}

fn details_or_null<'de, D>(deserializer: D) -> Result<ErrorDetails, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ErrorDetails>::deserialize(deserializer)?.unwrap_or_default())
}

impl ErrorEnvelope {
    /// Creates an envelope without details.
    pub fn new(message: impl Into<String>, code: impl Into<ErrorCode>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Creates an envelope whose code is the numeric HTTP `status`.
    pub fn from_status(status: HttpStatus, message: impl Into<String>) -> Self {
        Self::new(message, status)
    }

    /// Replaces the details.
    #[must_use]
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Adds a single detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key, value);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Decomposes the envelope into `(message, code, details)`.
    pub fn into_parts(self) -> (String, ErrorCode, ErrorDetails) {
        (self.message, self.code, self.details)
    }

    // -- well-known envelopes ---------------------------------------------

    /// [`codes::UNKNOWN_ERROR`] with the default message.
    pub fn unknown() -> Self {
        Self::new(messages::UNKNOWN_ERROR, codes::UNKNOWN_ERROR)
    }

    /// [`codes::TOKEN_INVALID`] with the default message.
    pub fn token_invalid() -> Self {
        Self::new(messages::TOKEN_INVALID, codes::TOKEN_INVALID)
    }

    /// [`codes::REMOTE_AUTHENTICATION_FAILED`] with the default message.
    pub fn remote_authentication_failed() -> Self {
        Self::new(
            messages::REMOTE_AUTHENTICATION_FAILED,
            codes::REMOTE_AUTHENTICATION_FAILED,
        )
    }

    /// [`codes::REMOTE_SERVICE_UNAVAILABLE`] with the default message.
    pub fn remote_service_unavailable() -> Self {
        Self::new(
            messages::REMOTE_SERVICE_UNAVAILABLE,
            codes::REMOTE_SERVICE_UNAVAILABLE,
        )
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serialises_fields_in_wire_order_and_omits_empty_details() {
        let envelope = ErrorEnvelope::new("Trip not found", 404);
        let wire = serde_json::to_string(&envelope).unwrap();
        assert_eq!(wire, r#"{"message":"Trip not found","code":404}"#);
    }

    #[test]
    fn serialises_details_when_present() {
        let envelope = ErrorEnvelope::new("Validation failed", 400)
            .with_detail("lat", "must be ≥ -90");
        let wire: Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            wire,
            json!({"message": "Validation failed", "code": 400, "details": {"lat": "must be ≥ -90"}})
        );
    }

    #[test]
    fn round_trip_preserves_message_code_and_details() {
        let original = ErrorEnvelope::token_invalid()
            .with_detail("realm", "booking")
            .with_detail("attempts", 3);
        let decoded: ErrorEnvelope =
            serde_json::from_str(&serde_json::to_string(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.code().is(codes::TOKEN_INVALID));
    }

    #[test]
    fn null_details_decode_as_absent() {
        let decoded: ErrorEnvelope =
            serde_json::from_str(r#"{"message":"x","code":"UNKNOWN_ERROR","details":null}"#)
                .unwrap();
        assert!(decoded.details().is_empty());
        assert_eq!(decoded, ErrorEnvelope::new("x", codes::UNKNOWN_ERROR));
    }

    #[test]
    fn code_accepts_numbers_and_strings() {
        let numeric: ErrorCode = serde_json::from_str("503").unwrap();
        let symbolic: ErrorCode = serde_json::from_str(r#""TOKEN_INVALID""#).unwrap();
        assert_eq!(numeric, ErrorCode::Numeric(503));
        assert_eq!(numeric.as_status(), Some(HttpStatus::SERVICE_UNAVAILABLE));
        assert!(symbolic.is(codes::TOKEN_INVALID));
        assert_eq!(symbolic.as_status(), None);
        assert_eq!(ErrorCode::symbolic("404").as_status(), Some(HttpStatus::NOT_FOUND));
    }
}
