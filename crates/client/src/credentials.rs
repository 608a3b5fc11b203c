//! Outbound credentials and their header placement.
//!
//! A request carries at most one [`Credentials`] value. Two modes exist:
//!
//! - **Payload** — an arbitrary JSON value sent in [`CREDENTIALS_HEADER`]. A
//!   JSON string is sent as-is; anything else is serialised to compact JSON.
//! - **Discrete** — `token`, `user_id`, `secret` fields, each sent in its own
//!   header ([`TOKEN_HEADER`], [`USER_ID_HEADER`], [`SECRET_HEADER`]).
//!
//! Precedence is last-writer-wins between the modes: setting a payload drops
//! any discrete fields, and setting a discrete field drops a payload. Discrete
//! fields merge with each other.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use envelope::MeshError;

pub const CREDENTIALS_HEADER: &str = "x-credentials";
pub const TOKEN_HEADER: &str = "x-token";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const SECRET_HEADER: &str = "x-secret";

/// Credentials attached to one outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    /// Opaque credential payload, serialised into `x-credentials`.
    Payload(Value),

    /// Discrete credential fields.
    Discrete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
}

impl Credentials {
    /// Discrete credentials with only a token.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Discrete {
            token: Some(token.into()),
            user_id: None,
            secret: None,
        }
    }

    /// Discrete credentials with a user id and secret.
    pub fn user_id_and_secret(user_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::Discrete {
            token: None,
            user_id: Some(user_id.into()),
            secret: Some(secret.into()),
        }
    }

    /// Writes these credentials into `headers`, replacing existing values.
    pub(crate) fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), MeshError> {
        match self {
            Self::Payload(Value::Null) => Ok(()),
            Self::Payload(Value::String(raw)) => insert(headers, CREDENTIALS_HEADER, raw),
            Self::Payload(other) => {
                // Serialising a `Value` cannot fail.
                let json = other.to_string();
                insert(headers, CREDENTIALS_HEADER, &json)
            }
            Self::Discrete {
                token,
                user_id,
                secret,
            } => {
                let fields = [
                    (TOKEN_HEADER, token),
                    (USER_ID_HEADER, user_id),
                    (SECRET_HEADER, secret),
                ];
                for (name, value) in fields {
                    if let Some(value) = value {
                        insert(headers, name, value)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), MeshError> {
    let value = HeaderValue::from_str(value).map_err(|_| {
        MeshError::validation(format!(
            "Credential value for header '{name}' contains characters not allowed in HTTP headers"
        ))
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// Merges one discrete field into `slot`, discarding a payload if present.
pub(crate) fn merge_discrete(
    slot: &mut Option<Credentials>,
    update: impl FnOnce(&mut Option<String>, &mut Option<String>, &mut Option<String>),
) {
    if !matches!(slot, Some(Credentials::Discrete { .. })) {
        *slot = Some(Credentials::Discrete {
            token: None,
            user_id: None,
            secret: None,
        });
    }
    if let Some(Credentials::Discrete {
        token,
        user_id,
        secret,
    }) = slot
    {
        update(token, user_id, secret);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn headers_for(credentials: &Credentials) -> HeaderMap {
        let mut headers = HeaderMap::new();
        credentials.apply_to(&mut headers).unwrap();
        headers
    }

    #[test]
    fn string_payload_is_sent_verbatim() {
        let headers = headers_for(&Credentials::Payload(json!("opaque-blob")));
        assert_eq!(headers[CREDENTIALS_HEADER], "opaque-blob");
    }

    #[test]
    fn structured_payload_is_serialised_as_json() {
        let headers = headers_for(&Credentials::Payload(json!({"user": "ana", "pin": 1234})));
        let sent: Value =
            serde_json::from_str(headers[CREDENTIALS_HEADER].to_str().unwrap()).unwrap();
        assert_eq!(sent, json!({"user": "ana", "pin": 1234}));
        assert!(headers.get(TOKEN_HEADER).is_none());
    }

    #[test]
    fn discrete_fields_each_get_a_header() {
        let headers = headers_for(&Credentials::Discrete {
            token: Some("t-1".into()),
            user_id: Some("u-1".into()),
            secret: None,
        });
        assert_eq!(headers[TOKEN_HEADER], "t-1");
        assert_eq!(headers[USER_ID_HEADER], "u-1");
        assert!(headers.get(SECRET_HEADER).is_none());
        assert!(headers.get(CREDENTIALS_HEADER).is_none());
    }

    #[test]
    fn injection_replaces_existing_header_values() {
        let mut headers = HeaderMap::new();
        headers.append(TOKEN_HEADER, HeaderValue::from_static("stale"));
        Credentials::token("fresh").apply_to(&mut headers).unwrap();
        let values: Vec<_> = headers.get_all(TOKEN_HEADER).iter().collect();
        assert_eq!(values, vec!["fresh"]);
    }

    #[test]
    fn control_characters_are_a_validation_error() {
        let mut headers = HeaderMap::new();
        let err = Credentials::token("bad\ntoken")
            .apply_to(&mut headers)
            .unwrap_err();
        assert_eq!(err.kind(), envelope::ErrorKind::ValidationError);
    }

    #[test]
    fn merging_discrete_fields_drops_a_payload() {
        let mut slot = Some(Credentials::Payload(json!({"k": "v"})));
        merge_discrete(&mut slot, |token, _, _| *token = Some("t".into()));
        merge_discrete(&mut slot, |_, user, _| *user = Some("u".into()));
        assert_eq!(
            slot,
            Some(Credentials::Discrete {
                token: Some("t".into()),
                user_id: Some("u".into()),
                secret: None,
            })
        );
    }

    #[test]
    fn deserialises_from_configuration_shape() {
        let creds: Credentials =
            serde_json::from_value(json!({"discrete": {"token": "svc-token"}})).unwrap();
        assert_eq!(creds, Credentials::token("svc-token"));
    }
}
