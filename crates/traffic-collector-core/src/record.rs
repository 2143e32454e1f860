//! Recorded request snapshot.
//!
//! A [`RecordedRequest`] is built once when a request has been fully read and
//! is never mutated afterwards. Its serialized form is the persisted artifact:
//! a JSON object with the fields `headers`, `body`, `method`, `path`, `query`
//! and `host`.

use http::header::HOST;
use http::request::Parts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multi-valued map keyed by name. Keys serialize in sorted order.
pub type ValueMap = BTreeMap<String, Vec<String>>;

/// Immutable snapshot of one inbound HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    headers: ValueMap,
    body: String,
    method: String,
    path: String,
    query: ValueMap,
    host: String,
}

impl RecordedRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        host: impl Into<String>,
        headers: ValueMap,
        query: ValueMap,
        body: &[u8],
    ) -> Self {
        Self {
            headers,
            body: String::from_utf8_lossy(body).into_owned(),
            method: method.into(),
            path: path.into(),
            query,
            host: host.into(),
        }
    }

    /// Capture request parts and a fully-read body.
    ///
    /// The `Host` header is moved out of `headers` into `host`; when it is
    /// absent (HTTP/2) the URI authority is used instead.
    pub fn capture(parts: &Parts, body: &[u8]) -> Self {
        let mut headers = ValueMap::new();
        for name in parts.headers.keys() {
            if name == HOST {
                continue;
            }
            let values = parts
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
            headers
                .entry(canonical_header_name(name.as_str()))
                .or_default()
                .extend(values);
        }

        let host = parts
            .headers
            .get(HOST)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self::new(
            parts.method.as_str(),
            parts.uri.path(),
            host,
            headers,
            parse_query(parts.uri.query()),
            body,
        )
    }

    pub fn headers(&self) -> &ValueMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &ValueMap {
        &self.query
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Canonical MIME header form: first letter and every letter following a
/// hyphen upper-cased, the rest lower-cased (`x-request-id` -> `X-Request-Id`).
pub fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn parse_query(query: Option<&str>) -> ValueMap {
    let mut values = ValueMap::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            values
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }
    values
}
