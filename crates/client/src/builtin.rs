//! Stock adapters wired by [`crate::MeshClient::builder_from_config`].

use std::collections::HashSet;

use reqwest::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use envelope::MeshError;

use crate::adapter::RequestAdapter;
use crate::credentials::Credentials;
use crate::request::OutboundRequest;

/// Header carrying the correlation id of an outbound call.
pub const CORRELATION_ID_HEADER: &str = "x-request-id";

// ---------------------------------------------------------------------------

/// Stamps every request with a fresh UUID v4 in [`CORRELATION_ID_HEADER`]
/// unless the caller (or an earlier adapter) already set one.
#[derive(Debug, Clone, Default)]
pub struct CorrelationIdAdapter;

impl RequestAdapter for CorrelationIdAdapter {
    fn adapt(&self, request: &mut OutboundRequest) -> Result<(), MeshError> {
        let name = HeaderName::from_static(CORRELATION_ID_HEADER);
        if !request.headers().contains_key(&name) {
            let id = Uuid::new_v4().to_string();
            // A hyphenated UUID is always a valid header value.
            if let Ok(value) = HeaderValue::from_str(&id) {
                request.headers_mut().insert(name, value);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "correlation-id"
    }
}

// ---------------------------------------------------------------------------

/// Attaches the service's own credentials to internal requests that carry none.
///
/// Requests relaying an external caller's input (the default) are left alone,
/// so the caller's own credentials, or none, travel downstream.
#[derive(Debug, Clone)]
pub struct InternalCredentialsAdapter {
    credentials: Credentials,
}

impl InternalCredentialsAdapter {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl RequestAdapter for InternalCredentialsAdapter {
    fn adapt(&self, request: &mut OutboundRequest) -> Result<(), MeshError> {
        if request.is_internal() && request.credentials().is_none() {
            request.set_credentials(self.credentials.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "internal-credentials"
    }
}

// ---------------------------------------------------------------------------

/// Vetoes requests addressed to any of a fixed set of hosts.
#[derive(Debug, Clone)]
pub struct HostDenyListAdapter {
    hosts: HashSet<String>,
}

impl HostDenyListAdapter {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl RequestAdapter for HostDenyListAdapter {
    fn adapt(&self, request: &mut OutboundRequest) -> Result<(), MeshError> {
        match request.host() {
            Some(host) if self.hosts.contains(&host) => Err(MeshError::validation(format!(
                "Requests to host '{host}' are not permitted"
            ))),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "host-deny-list"
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;

    fn request(url: &str) -> OutboundRequest {
        OutboundRequest::new(Method::GET, url)
    }

    #[test]
    fn correlation_id_is_added_once_and_never_overwritten() {
        let mut fresh = request("http://localhost/");
        CorrelationIdAdapter.adapt(&mut fresh).unwrap();
        let id = fresh.headers()[CORRELATION_ID_HEADER].to_str().unwrap().to_owned();
        assert!(Uuid::parse_str(&id).is_ok());

        let mut preset = request("http://localhost/");
        preset.set_header(CORRELATION_ID_HEADER, "upstream-id").unwrap();
        CorrelationIdAdapter.adapt(&mut preset).unwrap();
        assert_eq!(preset.headers()[CORRELATION_ID_HEADER], "upstream-id");
    }

    #[test]
    fn internal_credentials_only_fill_empty_internal_requests() {
        let adapter = InternalCredentialsAdapter::new(Credentials::token("service-token"));

        let mut relayed = request("http://billing-service/invoices");
        adapter.adapt(&mut relayed).unwrap();
        assert!(relayed.credentials().is_none());

        let mut internal = request("http://billing-service/invoices");
        internal.internal = true;
        adapter.adapt(&mut internal).unwrap();
        assert_eq!(internal.credentials(), Some(&Credentials::token("service-token")));

        let mut already = request("http://billing-service/invoices");
        already.internal = true;
        already.set_credentials(Credentials::token("caller"));
        adapter.adapt(&mut already).unwrap();
        assert_eq!(already.credentials(), Some(&Credentials::token("caller")));
    }

    #[test]
    fn deny_list_vetoes_matching_hosts_case_insensitively() {
        let adapter = HostDenyListAdapter::new(["Legacy-Gateway"]);
        let err = adapter
            .adapt(&mut request("http://legacy-gateway/v1"))
            .unwrap_err();
        assert_eq!(err.kind(), envelope::ErrorKind::ValidationError);
        assert!(adapter.adapt(&mut request("http://api.example.com/")).is_ok());
    }
}
