//! Router-level hooks that give platform-generated failures the same envelope
//! shape as handler failures.
//!
//! [`layer`] installs all of them around a finished router. The hooks must see
//! the complete response of the router, including the `Allow` header axum adds
//! after a route's handler has run, so they cannot be installed with
//! `Router::layer` on the application router itself.

use std::any::Any;

use axum::extract::Request;
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::BoundaryError;

/// Wraps a finished application router so that method mismatches and handler
/// panics are answered with envelopes.
///
/// Set the router's own fallback to [`fallback_not_found`] to cover unknown
/// routes as well.
pub fn layer(router: Router) -> Router {
    Router::new()
        .fallback_service(router)
        .layer(middleware::from_fn(normalize_method_not_allowed))
        .layer(CatchPanicLayer::custom(render_panic))
}

/// A panicking handler becomes the generic `500` envelope. The panic message
/// is logged, never returned.
fn render_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "non-string panic payload".to_owned()
    };
    BoundaryError::Unhandled(anyhow::anyhow!("handler panicked: {message}")).into_response()
}

/// Rewrites axum's bare `405 Method Not Allowed` into a [`BoundaryError::MethodNotAllowed`]
/// envelope, taking the allowed methods from the `Allow` header.
///
/// Installed by [`layer`]. Responses that already carry a JSON body are left
/// untouched.
pub async fn normalize_method_not_allowed(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED || is_json(&response) {
        return response;
    }

    let allow = response.headers().get(ALLOW).cloned();
    let allowed = allow
        .as_ref()
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let mut rendered = BoundaryError::MethodNotAllowed {
        method: method.to_string(),
        allowed,
    }
    .into_response();
    if let Some(allow) = allow {
        rendered.headers_mut().insert(ALLOW, allow);
    }
    rendered
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Fallback handler for unmatched routes: `404` with an envelope.
pub async fn fallback_not_found(method: Method, uri: Uri) -> BoundaryError {
    BoundaryError::NotFound(format!("No handler found for {method} {}", uri.path()))
}
