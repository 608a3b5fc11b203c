//! Successful responses handed back to callers.

use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use envelope::{codes, BoxError, ErrorEnvelope, HttpStatus, MeshError};

/// A `2xx`/`3xx` answer with its body fully read.
#[derive(Debug, Clone)]
pub struct MeshResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Vec<u8>,
}

impl MeshResponse {
    /// Reads the body of `response`. A body that cannot be read is a
    /// connection error: the peer went away mid-answer.
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, MeshError> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(|e| {
            MeshError::connection(
                format!("A depending service is unavailable: response body from {url} could not be read"),
                Some(Box::new(e) as BoxError),
            )
        })?;
        Ok(Self {
            status,
            headers,
            url,
            body: body.to_vec(),
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL actually contacted, after load-balancer rewriting.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// A body that does not decode is an [`MeshError::UnknownError`] with
    /// status `502`: the peer answered successfully but unintelligibly.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, MeshError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            let envelope = ErrorEnvelope::new(
                format!("Response from {} could not be decoded", self.url),
                codes::UNKNOWN_ERROR,
            )
            .with_detail("decoder", e.to_string());
            MeshError::UnknownError {
                status: HttpStatus::BAD_GATEWAY,
                envelope,
                source: Some(Box::new(e) as BoxError),
            }
        })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use envelope::{ErrorCode, ErrorKind};
    use serde::Deserialize;

    use super::*;

    fn response(body: &str) -> MeshResponse {
        MeshResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            url: Url::parse("http://localhost/trips/7").unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Trip {
        id: u32,
    }

    #[test]
    fn json_decodes_the_body() {
        assert_eq!(response(r#"{"id":7}"#).json::<Trip>().unwrap(), Trip { id: 7 });
    }

    #[test]
    fn undecodable_body_is_an_unknown_error_with_decoder_details() {
        let err = response("<html>").json::<Trip>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        assert_eq!(err.status(), HttpStatus::BAD_GATEWAY);
        assert_eq!(err.envelope().code(), &ErrorCode::symbolic(codes::UNKNOWN_ERROR));
        assert!(err.envelope().details().get("decoder").is_some());
    }
}
