//! The mutable outbound request that builders accumulate and adapters edit.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use envelope::MeshError;

use crate::credentials::Credentials;
use crate::template::{self, UriVariables};

/// One outbound HTTP call under construction.
///
/// Owned by exactly one [`crate::RequestBuilder`]. Adapters receive
/// `&mut OutboundRequest` and may read or change headers, query parameters,
/// the body, and credentials; the method and target URL are read-only to them.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    /// Values for `{name}` placeholders in `url`; expansion happens once.
    pub(crate) uri_variables: Option<UriVariables>,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) internal: bool,
    /// Setter failures recorded for `send()`; setters themselves never fail.
    pub(crate) problems: Vec<String>,
}

impl OutboundRequest {
    pub(crate) fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            uri_variables: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            credentials: None,
            internal: false,
            problems: Vec::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL (without accumulated query pairs). Before adapters run
    /// this may still contain `{name}` placeholders.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Host of the target URL, lowercased, or `None` if the URL does not parse.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets `name` to `value`, replacing any existing values.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), MeshError> {
        let (name, value) = parse_header(name, value).map_err(MeshError::validation)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Accumulated query parameters in insertion order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn add_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = Some(body.into());
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    /// `true` if the request was issued on the service's own behalf rather
    /// than relaying input from an external caller.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub(crate) fn append_header(&mut self, name: &str, value: &str) {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(problem) => self.problems.push(problem),
        }
    }

    /// Substitutes URI variables into the target URL, if any were given.
    /// A URL without variables is left untouched, braces included.
    pub(crate) fn expand_uri(&mut self) -> Result<(), MeshError> {
        if let Some(variables) = self.uri_variables.take() {
            self.url = template::expand(&self.url, &variables).map_err(MeshError::validation)?;
        }
        Ok(())
    }

    /// Finalises the request for the wire: appends the query to `url` and
    /// injects credentials into the headers.
    pub(crate) fn into_http_request(self, mut url: Url) -> Result<reqwest::Request, MeshError> {
        let Self {
            method,
            mut headers,
            query,
            body,
            credentials,
            ..
        } = self;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &query {
                pairs.append_pair(key, value);
            }
        }

        if let Some(credentials) = &credentials {
            credentials.apply_to(&mut headers)?;
        }

        let mut request = reqwest::Request::new(method, url);
        *request.headers_mut() = headers;
        if let Some(body) = body {
            *request.body_mut() = Some(reqwest::Body::from(body));
        }
        Ok(request)
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), String> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| format!("'{name}' is not a valid HTTP header name"))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| format!("Value for header '{name}' is not a valid HTTP header value"))?;
    Ok((header_name, header_value))
}
