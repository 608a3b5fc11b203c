//! Translation of failing HTTP responses into [`MeshError`]s.
//!
//! The translator never retries and never returns success: the caller
//! receives a classified error that carries as much of the remote diagnostic
//! information as could be decoded.
//!
//! Decoding tries, in order: the registered [`ErrorParser`]s, the standard
//! `{message, code, details}` shape, and finally a fallback built from the
//! raw body.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use envelope::{
    messages, ErrorCode, ErrorDetails, ErrorEnvelope, HttpStatus, MeshError,
    REMOTE_ERROR_MESSAGE_KEY,
};

/// Lenient view of a remote error body. Unknown fields are ignored and every
/// field is optional; usability is decided afterwards.
#[derive(Debug, Deserialize)]
struct RemoteEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    details: Option<Value>,
}

// ---------------------------------------------------------------------------
// ErrorParser
// ---------------------------------------------------------------------------

/// Decodes error bodies of a backend that does not speak the standard
/// envelope (a third-party provider, a legacy service).
///
/// Returning `None` passes the body on to the next parser and then to the
/// standard decoding. Implemented for any matching closure.
pub trait ErrorParser: Send + Sync {
    fn parse(&self, status: HttpStatus, headers: &HeaderMap, body: &str) -> Option<ErrorEnvelope>;
}

impl<F> ErrorParser for F
where
    F: Fn(HttpStatus, &HeaderMap, &str) -> Option<ErrorEnvelope> + Send + Sync,
{
    fn parse(&self, status: HttpStatus, headers: &HeaderMap, body: &str) -> Option<ErrorEnvelope> {
        self(status, headers, body)
    }
}

// ---------------------------------------------------------------------------
// ErrorTranslator
// ---------------------------------------------------------------------------

/// Converts failing HTTP responses into typed errors.
///
/// Owned by the [`crate::MeshClient`]; parsers are registered through
/// [`crate::MeshClientBuilder::error_parser`].
#[derive(Clone, Default)]
pub struct ErrorTranslator {
    parsers: Vec<Arc<dyn ErrorParser>>,
}

impl ErrorTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `parser` after those registered so far.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn ErrorParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }

    /// Reads the body of `response` and translates it.
    ///
    /// A body that cannot be read is treated as empty.
    pub async fn translate_response(&self, response: reqwest::Response) -> MeshError {
        let raw_status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        match HttpStatus::new(raw_status.as_u16()) {
            Some(status) => self.translate(status, &headers, &body),
            None => {
                error!(status = raw_status.as_u16(), body = %body, "Error response with non-standard status");
                MeshError::unknown(fallback_envelope(None, &body))
            }
        }
    }

    /// Translates an error answer with the given status, headers and raw body.
    ///
    /// `4xx` → [`MeshError::ClientError`], `5xx` → [`MeshError::ServerError`],
    /// anything else → [`MeshError::UnknownError`].
    pub fn translate(&self, status: HttpStatus, headers: &HeaderMap, body: &str) -> MeshError {
        error!(status = status.as_u16(), body = %body, "Error response received");
        MeshError::from_status(status, self.decode_envelope(status, headers, body))
    }

    /// Decodes `body` into an envelope, falling back to a synthetic one when
    /// no parser claims it and it is not a usable `{message, code, details}`
    /// object.
    pub fn decode_envelope(&self, status: HttpStatus, headers: &HeaderMap, body: &str) -> ErrorEnvelope {
        let parsed = self.parsers.iter().enumerate().find_map(|(index, parser)| {
            let envelope = parser.parse(status, headers, body)?;
            debug!(parser = index, "error body decoded by registered parser");
            Some(envelope)
        });
        parsed
            .or_else(|| decode_structured(status, body))
            .unwrap_or_else(|| fallback_envelope(Some(status), body))
    }
}

impl std::fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("parsers", &self.parsers.len())
            .finish()
    }
}

fn decode_structured(status: HttpStatus, body: &str) -> Option<ErrorEnvelope> {
    let remote: RemoteEnvelope = serde_json::from_str(body).ok()?;
    let message = remote.message.filter(|m| !m.trim().is_empty())?;

    let code = match remote.code {
        Some(Value::Number(n)) => n.as_i64().map(ErrorCode::Numeric),
        Some(Value::String(s)) if !s.is_empty() => Some(ErrorCode::Symbolic(s)),
        _ => None,
    }
    .unwrap_or_else(|| ErrorCode::from(status));

    let details: ErrorDetails = match remote.details {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => ErrorDetails::new(),
    };

    Some(ErrorEnvelope::new(message, code).with_details(details))
}

fn fallback_envelope(status: Option<HttpStatus>, body: &str) -> ErrorEnvelope {
    let code = status.map_or_else(|| ErrorCode::symbolic(envelope::codes::UNKNOWN_ERROR), ErrorCode::from);
    if body.is_empty() {
        ErrorEnvelope::new(messages::UNKNOWN_ERROR, code)
    } else {
        ErrorEnvelope::new(body, code).with_detail(REMOTE_ERROR_MESSAGE_KEY, body)
    }
}

#[cfg(test)]
mod tests {
    use envelope::ErrorKind;
    use serde_json::json;

    use super::*;

    fn status(code: u16) -> HttpStatus {
        HttpStatus::new(code).unwrap()
    }

    fn translate(code: u16, body: &str) -> MeshError {
        ErrorTranslator::new().translate(status(code), &HeaderMap::new(), body)
    }

    /// A provider that answers `{"error": {"reason": "..."}}`.
    fn provider_parser(_: HttpStatus, _: &HeaderMap, body: &str) -> Option<ErrorEnvelope> {
        let value: Value = serde_json::from_str(body).ok()?;
        let reason = value.get("error")?.get("reason")?.as_str()?;
        Some(ErrorEnvelope::new(reason, "PROVIDER_ERROR"))
    }

    #[test]
    fn structured_body_is_decoded_verbatim() {
        let body = json!({
            "message": "Vehicle already booked",
            "code": "BOOKING_CONFLICT",
            "details": {"vehicleId": "v-42"},
            "timestamp": "2026-10-18T09:00:00Z"
        })
        .to_string();
        let err = translate(409, &body);
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(err.status().as_u16(), 409);
        let env = err.envelope();
        assert_eq!(env.message(), "Vehicle already booked");
        assert_eq!(env.code(), &ErrorCode::symbolic("BOOKING_CONFLICT"));
        assert_eq!(env.details().get("vehicleId"), Some(&json!("v-42")));
    }

    #[test]
    fn missing_code_defaults_to_the_status() {
        let err = translate(422, r#"{"message":"bad seat count"}"#);
        assert_eq!(err.envelope().code(), &ErrorCode::Numeric(422));
        assert!(err.envelope().details().is_empty());
    }

    #[test]
    fn non_json_body_falls_back_to_raw_text() {
        let err = translate(503, "Service Temporarily Down");
        assert_eq!(err.kind(), ErrorKind::ServerError);
        let env = err.envelope();
        assert_eq!(env.code(), &ErrorCode::Numeric(503));
        assert_eq!(env.message(), "Service Temporarily Down");
        assert_eq!(
            env.details().get(REMOTE_ERROR_MESSAGE_KEY),
            Some(&json!("Service Temporarily Down"))
        );
    }

    #[test]
    fn empty_body_uses_generic_message_and_no_details() {
        let err = translate(500, "");
        let env = err.envelope();
        assert_eq!(env.message(), messages::UNKNOWN_ERROR);
        assert_eq!(env.code(), &ErrorCode::Numeric(500));
        assert!(env.details().is_empty());
    }

    #[test]
    fn json_without_a_usable_message_falls_back() {
        for body in [r#"{"code":"X"}"#, r#"{"message":"  "}"#, r#"["message"]"#, "42"] {
            let env = ErrorTranslator::new().decode_envelope(status(400), &HeaderMap::new(), body);
            assert_eq!(env.message(), body);
            assert_eq!(env.code(), &ErrorCode::Numeric(400));
        }
    }

    #[test]
    fn non_error_status_becomes_unknown_error() {
        let err = translate(302, "moved");
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.status().as_u16(), 302);
    }

    #[test]
    fn registered_parser_is_consulted_before_the_standard_shape() {
        let translator = ErrorTranslator::new().with_parser(Arc::new(provider_parser));
        let err = translator.translate(
            status(429),
            &HeaderMap::new(),
            r#"{"error":{"reason":"quota exhausted"}}"#,
        );
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(err.envelope().message(), "quota exhausted");
        assert_eq!(err.envelope().code(), &ErrorCode::symbolic("PROVIDER_ERROR"));
    }

    #[test]
    fn declining_parsers_fall_through_in_order() {
        let declines = |_: HttpStatus, _: &HeaderMap, _: &str| -> Option<ErrorEnvelope> { None };
        let by_header = |_: HttpStatus, headers: &HeaderMap, _: &str| -> Option<ErrorEnvelope> {
            headers
                .get("x-provider-error")
                .and_then(|v| v.to_str().ok())
                .map(|reason| ErrorEnvelope::new(reason, "HEADER_ERROR"))
        };
        let translator = ErrorTranslator::new()
            .with_parser(Arc::new(declines))
            .with_parser(Arc::new(by_header));

        let standard = r#"{"message":"Trip not found","code":"TRIP_NOT_FOUND"}"#;
        let env = translator.decode_envelope(status(404), &HeaderMap::new(), standard);
        assert_eq!(env.code(), &ErrorCode::symbolic("TRIP_NOT_FOUND"));

        let mut headers = HeaderMap::new();
        headers.insert("x-provider-error", "card declined".parse().unwrap());
        let env = translator.decode_envelope(status(402), &headers, standard);
        assert_eq!(env.message(), "card declined");
        assert_eq!(translator.parser_count(), 2);
    }
}
