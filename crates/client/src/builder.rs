//! The fluent request builder and the outbound state machine behind `send()`.
//!
//! A [`RequestBuilder`] is generic over whether the client's adapters have
//! already been applied to its request:
//!
//! | State | `apply_adapters()` | `send()` |
//! |-------|--------------------|----------|
//! | [`Building`] | available, returns `RequestBuilder<Adapted>` | applies adapters, then sends |
//! | [`Adapted`] | does not exist | sends without re-applying |
//!
//! Every setter returns the same concrete builder type, so chaining never
//! loses the state, and adapters cannot run twice for one request.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, field, instrument, Span};

use envelope::{ErrorDetails, MeshError};

use crate::client::MeshClient;
use crate::credentials::{merge_discrete, Credentials};
use crate::request::OutboundRequest;
use crate::response::MeshResponse;
use crate::template::UriVariables;
use crate::transport;

// ---------------------------------------------------------------------------
// Adapter states
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Building {}
    impl Sealed for super::Adapted {}
}

/// Marker for the two builder states. Sealed.
pub trait AdapterState: sealed::Sealed + Send + Sync + 'static {
    const ADAPTERS_APPLIED: bool;
}

/// Adapters have not run yet.
#[derive(Debug, Clone, Copy)]
pub struct Building;

/// Adapters have run; they will not run again.
#[derive(Debug, Clone, Copy)]
pub struct Adapted;

impl AdapterState for Building {
    const ADAPTERS_APPLIED: bool = false;
}

impl AdapterState for Adapted {
    const ADAPTERS_APPLIED: bool = true;
}

// ---------------------------------------------------------------------------
// RequestBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for one outbound call. Obtained from [`MeshClient`].
///
/// Setters never fail. Invalid header names or values and bodies that cannot
/// be serialised are recorded and reported by [`RequestBuilder::send`] as a
/// [`MeshError::ValidationError`] before any network activity.
#[must_use = "a request does nothing until `send()` is awaited"]
pub struct RequestBuilder<S: AdapterState = Building> {
    client: MeshClient,
    request: OutboundRequest,
    state: PhantomData<S>,
}

impl RequestBuilder<Building> {
    pub(crate) fn new(client: MeshClient, method: Method, url: String) -> Self {
        Self {
            client,
            request: OutboundRequest::new(method, url),
            state: PhantomData,
        }
    }

    /// Runs every registered adapter against the request, in registration order.
    ///
    /// An adapter error is returned unchanged and the builder is dropped;
    /// effects of adapters that already ran are not undone.
    pub fn apply_adapters(self) -> Result<RequestBuilder<Adapted>, MeshError> {
        let Self {
            client,
            mut request,
            ..
        } = self;
        request.expand_uri()?;
        client.adapters().apply_all(&mut request)?;
        Ok(RequestBuilder {
            client,
            request,
            state: PhantomData,
        })
    }
}

impl<S: AdapterState> RequestBuilder<S> {
    // -- target -------------------------------------------------------------

    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    /// Replaces the target URL. It may contain `{name}` placeholders, filled
    /// from [`RequestBuilder::uri_variables`] or [`RequestBuilder::uri_values`].
    pub fn uri(mut self, url: impl Into<String>) -> Self {
        self.request.url = url.into();
        self
    }

    /// Adds one named value for a `{name}` placeholder. Replaces positional
    /// values set earlier.
    pub fn uri_variable(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let (name, value) = (name.into(), value.to_string());
        match &mut self.request.uri_variables {
            Some(UriVariables::Named(values)) => {
                values.insert(name, value);
            }
            slot => *slot = Some(UriVariables::Named(BTreeMap::from([(name, value)]))),
        }
        self
    }

    /// Fills `{name}` placeholders by name, replacing earlier URI variables.
    ///
    /// Values are percent-encoded on substitution. A placeholder left without
    /// a value makes `send()` fail with a [`MeshError::ValidationError`].
    pub fn uri_variables<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let values = variables
            .into_iter()
            .map(|(name, value)| (name.into(), value.to_string()))
            .collect();
        self.request.uri_variables = Some(UriVariables::Named(values));
        self
    }

    /// Fills placeholders left to right from `values`, replacing earlier URI
    /// variables.
    pub fn uri_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.request.uri_variables = Some(UriVariables::Positional(values));
        self
    }

    // -- headers and query --------------------------------------------------

    /// Adds a header value. Repeated names accumulate.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.request.append_header(name.as_ref(), value.as_ref());
        self
    }

    /// Adds every entry of `headers`.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut current = None;
        for (name, value) in headers {
            if let Some(name) = name {
                current = Some(name);
            }
            if let Some(name) = &current {
                self.request.headers.append(name.clone(), value);
            }
        }
        self
    }

    /// Adds one query parameter. Repeated keys accumulate.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.request.add_query(key, value.to_string());
        self
    }

    /// Adds one query parameter per value, all under `key`.
    pub fn query_values<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let key = key.into();
        for value in values {
            self.request.add_query(key.clone(), value.to_string());
        }
        self
    }

    /// Adds every `(key, value)` pair.
    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in pairs {
            self.request.add_query(key, value.to_string());
        }
        self
    }

    // -- body ---------------------------------------------------------------

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request.set_body(body);
        self
    }

    /// Serialises `value` as the JSON body and sets `Content-Type:
    /// application/json` unless a content type was already chosen.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.request.set_body(bytes);
                if !self.request.headers.contains_key(CONTENT_TYPE) {
                    self.request
                        .headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
            }
            Err(e) => self
                .request
                .problems
                .push(format!("Request body could not be serialised as JSON: {e}")),
        }
        self
    }

    /// Sets `Content-Type`, replacing any earlier value.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        match HeaderValue::from_str(content_type.as_ref()) {
            Ok(value) => {
                self.request.headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => self.request.problems.push(format!(
                "'{}' is not a valid content type",
                content_type.as_ref()
            )),
        }
        self
    }

    // -- credentials --------------------------------------------------------

    /// Uses `credentials` as an opaque payload in `x-credentials`, replacing
    /// any credentials set so far (including discrete fields).
    pub fn credentials<T: Serialize + ?Sized>(mut self, credentials: &T) -> Self {
        match serde_json::to_value(credentials) {
            Ok(value) => self.request.credentials = Some(Credentials::Payload(value)),
            Err(e) => self
                .request
                .problems
                .push(format!("Credentials could not be serialised: {e}")),
        }
        self
    }

    /// Sets the discrete token, replacing a credential payload if one was set.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        merge_discrete(&mut self.request.credentials, |t, _, _| *t = Some(token));
        self
    }

    /// Sets the discrete user id, replacing a credential payload if one was set.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        merge_discrete(&mut self.request.credentials, |_, u, _| *u = Some(user_id));
        self
    }

    /// Sets the discrete secret, replacing a credential payload if one was set.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        merge_discrete(&mut self.request.credentials, |_, _, s| *s = Some(secret));
        self
    }

    pub fn user_id_and_secret(self, user_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.user_id(user_id).secret(secret)
    }

    // -- flags and inspection ----------------------------------------------

    /// Marks the request as issued on the service's own behalf. Idempotent.
    pub fn to_internal(mut self) -> Self {
        self.request.internal = true;
        self
    }

    /// The request as it currently stands.
    pub fn request(&self) -> &OutboundRequest {
        &self.request
    }

    pub fn adapters_applied(&self) -> bool {
        S::ADAPTERS_APPLIED
    }

    // -- execution ----------------------------------------------------------

    /// Sends the request exactly once.
    ///
    /// Steps, in order: report recorded setter problems, expand URI
    /// variables, validate the URL,
    /// pick the transport, apply adapters (unless already applied), inject
    /// credentials, execute. `2xx`/`3xx` answers are returned; `4xx`/`5xx`
    /// answers are translated into [`MeshError`].
    #[instrument(
        name = "mesh.send",
        skip_all,
        fields(
            method = %self.request.method,
            url = %self.request.url,
            transport = field::Empty,
            status = field::Empty,
        )
    )]
    pub async fn send(self) -> Result<MeshResponse, MeshError> {
        let Self {
            client,
            mut request,
            ..
        } = self;

        if !request.problems.is_empty() {
            return Err(problems_to_error(&request.problems));
        }

        request.expand_uri()?;
        let url = transport::parse_target(&request.url)?;
        let transport = transport::classify_url(&url);
        Span::current().record("transport", field::display(transport));

        if !S::ADAPTERS_APPLIED {
            client.adapters().apply_all(&mut request)?;
        }

        let http_request = request.into_http_request(url)?;
        let response = client.executor(transport).execute(http_request).await?;

        let status = response.status();
        Span::current().record("status", u64::from(status.as_u16()));
        if status.is_client_error() || status.is_server_error() {
            return Err(client.translator().translate_response(response).await);
        }

        debug!("request succeeded");
        MeshResponse::read(response).await
    }

    /// [`RequestBuilder::send`], then decodes the body as JSON.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<T, MeshError> {
        self.send().await?.json()
    }
}

impl<S: AdapterState> std::fmt::Debug for RequestBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("request", &self.request)
            .field("adapters_applied", &S::ADAPTERS_APPLIED)
            .finish_non_exhaustive()
    }
}

fn problems_to_error(problems: &[String]) -> MeshError {
    if let [only] = problems {
        return MeshError::validation(only.clone());
    }
    let details: ErrorDetails = problems
        .iter()
        .enumerate()
        .map(|(i, problem)| (format!("problem_{}", i + 1), problem.clone()))
        .collect();
    MeshError::validation_with_details("The request could not be built", details)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use envelope::ErrorKind;
    use serde_json::json;

    use super::*;

    fn client() -> MeshClient {
        MeshClient::builder().build().unwrap()
    }

    #[test]
    fn payload_then_discrete_keeps_only_discrete() {
        let builder = client()
            .get("http://localhost/")
            .credentials(&json!({"apiKey": "k"}))
            .token("t");
        assert_eq!(builder.request().credentials(), Some(&Credentials::token("t")));
    }

    #[test]
    fn discrete_then_payload_keeps_only_payload() {
        let builder = client()
            .get("http://localhost/")
            .user_id_and_secret("u", "s")
            .credentials(&json!({"apiKey": "k"}));
        assert_eq!(
            builder.request().credentials(),
            Some(&Credentials::Payload(json!({"apiKey": "k"})))
        );
    }

    #[test]
    fn json_sets_content_type_unless_already_chosen() {
        let builder = client().post("http://localhost/").json(&json!({"seats": 2}));
        assert_eq!(builder.request().headers()[CONTENT_TYPE], "application/json");

        let builder = client()
            .post("http://localhost/")
            .content_type("application/vnd.trip+json")
            .json(&json!({"seats": 2}));
        assert_eq!(builder.request().headers()[CONTENT_TYPE], "application/vnd.trip+json");
    }

    #[test]
    fn setters_preserve_state_and_to_internal_is_idempotent() {
        let builder = client()
            .new_request()
            .method(Method::PUT)
            .uri("http://localhost/trips/1")
            .to_internal()
            .to_internal()
            .query_values("stop", [1, 2])
            .query_pairs([("mode", "bus")]);
        assert!(!builder.adapters_applied());
        assert!(builder.request().is_internal());
        assert_eq!(builder.request().method(), &Method::PUT);
        assert_eq!(builder.request().query().len(), 3);
    }

    #[test]
    fn apply_adapters_runs_each_adapter_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let client = MeshClient::builder()
            .adapter(move |_: &mut OutboundRequest| -> Result<(), MeshError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();

        let adapted = client.get("http://localhost/").apply_adapters().unwrap();
        let adapted = adapted.header("x-after", "1");
        assert!(adapted.adapters_applied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recorded_problems_fail_before_any_io() {
        let err = client()
            .get("http://localhost:1/")
            .header("bad header", "x")
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(err.message().contains("bad header"));
    }

    #[tokio::test]
    async fn relative_url_is_a_validation_error() {
        let err = client().get("/trips").send().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn several_problems_are_listed_in_details() {
        let err = problems_to_error(&["a".to_owned(), "b".to_owned()]);
        assert_eq!(err.envelope().details().len(), 2);
        assert_eq!(err.envelope().details().get("problem_2"), Some(&json!("b")));
    }

    #[test]
    fn uri_variables_are_expanded_before_adapters_see_the_request() {
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let client = MeshClient::builder()
            .adapter(move |request: &mut OutboundRequest| -> Result<(), MeshError> {
                *sink.lock().unwrap() = request.url().to_owned();
                Ok(())
            })
            .build()
            .unwrap();

        client
            .new_request()
            .uri("http://{service}/trips/{tripId}/notes/{note}")
            .uri_variables([("service", "trip-service"), ("tripId", "7")])
            .uri_variable("note", "late pickup/2")
            .apply_adapters()
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            "http://trip-service/trips/7/notes/late%20pickup%2F2"
        );
    }

    #[test]
    fn positional_uri_values_replace_named_ones() {
        let adapted = client()
            .get("http://localhost/invoices/{id}")
            .uri_variable("id", 1)
            .uri_values([42])
            .apply_adapters()
            .unwrap();
        assert_eq!(adapted.request().url(), "http://localhost/invoices/42");
    }

    #[tokio::test]
    async fn unresolved_placeholder_fails_before_any_io() {
        let err = client()
            .get("http://localhost:1/trips/{tripId}/stops/{index}")
            .uri_variable("tripId", 7)
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(err.message().contains("'index'"), "{}", err.message());
    }

    #[test]
    fn braces_without_variables_are_left_alone() {
        let adapted = client()
            .get("http://localhost/raw/{literal}")
            .apply_adapters()
            .unwrap();
        assert_eq!(adapted.request().url(), "http://localhost/raw/{literal}");
    }
}
