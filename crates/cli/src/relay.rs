//! The relay HTTP surface.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /health` | `{"status":"ok"}` |
//! | `ANY /relay/{target}/{*path}` | forwards to `http://{target}/{path}` through the [`MeshClient`] |
//!
//! Forwarding keeps the method, query string, body, content type, credentials
//! and correlation id of the inbound call. The path is forwarded exactly as
//! received, percent-encoding included. Upstream failures come back as the
//! upstream envelope with the upstream status; unreachable upstreams as `502`.
//!
//! Credentials arriving in one mode go through the client's credential slot.
//! A caller that sends both `x-credentials` and discrete headers gets both
//! forwarded unchanged.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::instrument;

use boundary::{fallback_not_found, BoundaryError};
use client::{
    MeshClient, RequestBuilder, CORRELATION_ID_HEADER, CREDENTIALS_HEADER, SECRET_HEADER,
    TOKEN_HEADER, USER_ID_HEADER,
};

#[derive(Debug, Clone)]
struct RelayState {
    client: MeshClient,
}

/// Builds the relay router around `client`.
pub fn router(client: MeshClient) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/relay/:target/*path", any(relay))
        .fallback(fallback_not_found)
        .with_state(RelayState { client });
    boundary::layer(routes)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[instrument(name = "relay", skip(state, method, headers, body), fields(%method))]
async fn relay(
    State(state): State<RelayState>,
    Path((target, _)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, BoundaryError> {
    let mut url = format!("http://{target}/{}", encoded_path(&uri));
    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let mut outbound = forward_headers(state.client.request(method, url), &headers);
    if !body.is_empty() {
        outbound = outbound.body(body.to_vec());
    }

    let upstream = outbound.send().await?;

    let mut response = (upstream.status(), upstream.bytes().to_vec()).into_response();
    if let Some(content_type) = upstream.headers().get(CONTENT_TYPE) {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, content_type.clone());
    }
    Ok(response)
}

/// Copies the caller's content type, correlation id and credentials.
fn forward_headers(mut outbound: RequestBuilder, headers: &HeaderMap) -> RequestBuilder {
    let text = |name: &str| header_text(headers, name);

    if let Some(content_type) = text(CONTENT_TYPE.as_str()) {
        outbound = outbound.content_type(content_type);
    }
    if let Some(id) = text(CORRELATION_ID_HEADER) {
        outbound = outbound.header(CORRELATION_ID_HEADER, id);
    }

    let discrete = [TOKEN_HEADER, USER_ID_HEADER, SECRET_HEADER]
        .iter()
        .any(|name| headers.contains_key(*name));
    if let Some(payload) = text(CREDENTIALS_HEADER) {
        outbound = if discrete {
            outbound.header(CREDENTIALS_HEADER, payload)
        } else {
            outbound.credentials(payload)
        };
    }
    if let Some(token) = text(TOKEN_HEADER) {
        outbound = outbound.token(token);
    }
    if let Some(user_id) = text(USER_ID_HEADER) {
        outbound = outbound.user_id(user_id);
    }
    if let Some(secret) = text(SECRET_HEADER) {
        outbound = outbound.secret(secret);
    }
    outbound
}

/// The part of the inbound path after `/relay/{target}/`, still percent-encoded.
fn encoded_path(uri: &Uri) -> &str {
    uri.path().splitn(4, '/').nth(3).unwrap_or_default()
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
