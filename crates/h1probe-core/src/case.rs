//! Test case model and structured request builder
//!
//! A [`TestCase`] is immutable once built: the builder-style methods consume
//! `self`, and nothing hands out `&mut` access afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};

/// Longest per-case timeout accepted from a config or catalog file.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Status codes a case accepts: one primary code plus tolerated alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Expectation {
    /// Primary expected status code
    pub expected: u16,
    /// Other codes that also count as a pass
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub alternatives: BTreeSet<u16>,
}

impl Expectation {
    #[must_use]
    pub fn exactly(expected: u16) -> Self {
        Self {
            expected,
            alternatives: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn or(mut self, alternatives: impl IntoIterator<Item = u16>) -> Self {
        self.alternatives.extend(alternatives);
        self
    }

    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        status == self.expected || self.alternatives.contains(&status)
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expected)?;
        if !self.alternatives.is_empty() {
            let alts: Vec<String> = self.alternatives.iter().map(u16::to_string).collect();
            write!(f, " (or {})", alts.join(", "))?;
        }
        Ok(())
    }
}

/// One conformance case: the exact bytes to send and what to expect back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TestCase {
    name: String,
    category: String,
    #[serde(serialize_with = "serialize_lossy")]
    #[schemars(with = "String")]
    request: Vec<u8>,
    expectation: Expectation,
    #[serde(
        serialize_with = "serialize_secs",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<f64>")]
    timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    body_contains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    body_excludes: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    allow_malformed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    single_response: bool,
}

impl TestCase {
    /// Case from literal request bytes (malformed requests are the usual reason).
    pub fn raw(
        name: impl Into<String>,
        category: impl Into<String>,
        request: impl Into<Vec<u8>>,
        expectation: Expectation,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            request: request.into(),
            expectation,
            timeout: None,
            skip: None,
            body_contains: Vec::new(),
            body_excludes: Vec::new(),
            allow_malformed: false,
            single_response: false,
        }
    }

    /// Case from a structured request, serialized with [`RequestTemplate::to_bytes`].
    pub fn structured(
        name: impl Into<String>,
        category: impl Into<String>,
        template: &RequestTemplate,
        expectation: Expectation,
    ) -> Self {
        Self::raw(name, category, template.to_bytes(), expectation)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark the case as skipped; the transport is never touched for it.
    #[must_use]
    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }

    #[must_use]
    pub fn body_contains(mut self, needle: impl Into<String>) -> Self {
        self.body_contains.push(needle.into());
        self
    }

    #[must_use]
    pub fn body_excludes(mut self, needle: impl Into<String>) -> Self {
        self.body_excludes.push(needle.into());
        self
    }

    /// Let the status code decide even when framing came back `Malformed`.
    #[must_use]
    pub fn allow_malformed(mut self) -> Self {
        self.allow_malformed = true;
        self
    }

    /// Fail if a second response follows the first on the same connection.
    #[must_use]
    pub fn single_response(mut self) -> Self {
        self.single_response = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn request(&self) -> &[u8] {
        &self.request
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip.as_deref()
    }

    pub fn required_substrings(&self) -> &[String] {
        &self.body_contains
    }

    pub fn forbidden_substrings(&self) -> &[String] {
        &self.body_excludes
    }

    pub fn tolerates_malformed(&self) -> bool {
        self.allow_malformed
    }

    pub fn expects_single_response(&self) -> bool {
        self.single_response
    }

    /// HEAD responses carry no body regardless of their headers.
    pub fn is_head(&self) -> bool {
        self.request.split(|&b| b == b' ').next() == Some(b"HEAD".as_slice())
    }
}

/// Structured request: `{method, path, headers, body}` serialized with CRLF framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTemplate {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Header lines in send order; duplicates are sent as given
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_version() -> String {
    "HTTP/1.1".to_string()
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: default_method(),
            path: default_path(),
            version: default_version(),
            headers: Vec::new(),
            body: None,
        }
    }
}

impl RequestTemplate {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(n, _)| n.trim().eq_ignore_ascii_case(name))
    }

    /// Request line, headers in order, `Content-Length` added for a body when
    /// no framing header was given, blank line, body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("{} {} {}\r\n", self.method, self.path, self.version);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        if let Some(body) = &self.body {
            if !self.has_header("content-length") && !self.has_header("transfer-encoding") {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        if let Some(body) = &self.body {
            out.extend_from_slice(body.as_bytes());
        }
        out
    }
}

pub(crate) fn serialize_lossy<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(bytes))
}

fn serialize_secs<S: Serializer>(timeout: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match timeout {
        Some(t) => s.serialize_f64(t.as_secs_f64()),
        None => s.serialize_none(),
    }
}
