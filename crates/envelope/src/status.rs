//! HTTP status value type.
//!
//! The domain crate deliberately has no dependency on an HTTP library, so the
//! status code that travels with every [`crate::MeshError`] is a plain newtype
//! over `u16`. Conversions to `reqwest`/`axum` status types live in the
//! infrastructure crates.

use serde::{Deserialize, Serialize};

/// An HTTP response status code in the range `100..=599`.
///
/// Every taxonomy member carries exactly one of these. It is fixed when the
/// error is constructed and never recomputed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct HttpStatus(u16);

impl HttpStatus {
    pub const BAD_REQUEST: Self = Self(400);
    pub const UNAUTHORIZED: Self = Self(401);
    pub const FORBIDDEN: Self = Self(403);
    pub const NOT_FOUND: Self = Self(404);
    pub const METHOD_NOT_ALLOWED: Self = Self(405);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    pub const NOT_IMPLEMENTED: Self = Self(501);
    pub const BAD_GATEWAY: Self = Self(502);
    pub const SERVICE_UNAVAILABLE: Self = Self(503);

    /// Creates an [`HttpStatus`], returning `None` if `code` is outside `100..=599`.
    #[must_use]
    pub fn new(code: u16) -> Option<Self> {
        if (100..=599).contains(&code) {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Returns the numeric status code.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// `2xx`.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// `3xx`.
    pub fn is_redirection(self) -> bool {
        (300..400).contains(&self.0)
    }

    /// `4xx` — the peer rejected the caller's request.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.0)
    }

    /// `5xx` — the peer failed while handling the request.
    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }

    /// Returns `true` for any status the error translator must handle (`4xx` or `5xx`).
    pub fn is_error(self) -> bool {
        self.is_client_error() || self.is_server_error()
    }
}

impl TryFrom<u16> for HttpStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::new(code).ok_or_else(|| format!("{code} is not a valid HTTP status code"))
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.0
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
