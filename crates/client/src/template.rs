//! `{name}` placeholders in request URLs.
//!
//! A target such as `http://trip-service/trips/{tripId}/stops/{index}` is
//! expanded when the request is prepared, either from named values or from
//! values taken in placeholder order. Every substituted value is
//! percent-encoded so it stays within the URL component it lands in.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is in a substituted value: RFC 3986 unreserved.
const VARIABLE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Values for the placeholders of one request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriVariables {
    /// Looked up by placeholder name.
    Named(BTreeMap<String, String>),
    /// Consumed one per placeholder, left to right. Surplus values are ignored.
    Positional(Vec<String>),
}

/// Replaces every `{name}` in `template`.
///
/// Fails with a readable problem description when a placeholder has no value
/// or a brace is unbalanced.
pub(crate) fn expand(template: &str, variables: &UriVariables) -> Result<String, String> {
    let mut expanded = String::with_capacity(template.len());
    let mut unresolved = Vec::new();
    let mut position = 0;
    let mut rest = template;

    while let Some(open) = rest.find(&['{', '}'][..]) {
        if rest[open..].starts_with('}') {
            return Err(format!("URI template '{template}' has an unmatched '}}'"));
        }
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            return Err(format!("URI template '{template}' has an unclosed '{{'"));
        };
        expanded.push_str(&rest[..open]);

        let name = rest[open + 1..close].trim();
        let value = match variables {
            UriVariables::Named(values) => values.get(name),
            UriVariables::Positional(values) => values.get(position),
        };
        position += 1;
        match value {
            Some(value) => expanded.extend(utf8_percent_encode(value, VARIABLE_VALUE)),
            None => unresolved.push(name.to_owned()),
        }
        rest = &rest[close + 1..];
    }
    expanded.push_str(rest);

    if unresolved.is_empty() {
        Ok(expanded)
    } else {
        Err(format!(
            "No value for URI variable(s) {} in '{template}'",
            unresolved
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(pairs: &[(&str, &str)]) -> UriVariables {
        UriVariables::Named(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn named_values_are_substituted_and_encoded() {
        let url = expand(
            "http://trip-service/trips/{tripId}/notes/{note}",
            &named(&[("tripId", "7"), ("note", "a/b?c#d e")]),
        )
        .unwrap();
        assert_eq!(url, "http://trip-service/trips/7/notes/a%2Fb%3Fc%23d%20e");
    }

    #[test]
    fn positional_values_follow_placeholder_order() {
        let variables = UriVariables::Positional(vec!["billing-service".into(), "42".into(), "x".into()]);
        let url = expand("http://{host}/invoices/{id}", &variables).unwrap();
        assert_eq!(url, "http://billing-service/invoices/42");
    }

    #[test]
    fn missing_values_are_all_reported() {
        let problem = expand("http://localhost/{a}/{b}/{c}", &named(&[("b", "1")])).unwrap_err();
        assert!(problem.contains("'a', 'c'"), "{problem}");
    }

    #[test]
    fn unbalanced_braces_are_rejected() {
        assert!(expand("http://localhost/{id", &named(&[])).is_err());
        assert!(expand("http://localhost/id}", &named(&[])).is_err());
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        let url = expand("http://localhost/trips?x=1", &UriVariables::Positional(vec![])).unwrap();
        assert_eq!(url, "http://localhost/trips?x=1");
    }
}
