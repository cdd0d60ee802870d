//! Response parsing: status line, header lines, body
//!
//! Never fails. A reply that does not parse is still a reply, and the pieces
//! that did parse are exactly what malformed-input cases need to inspect.

use std::borrow::Cow;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::frame::{FrameLimits, Framed, Framer, FramingOutcome};

/// One line of the header section, in arrival order. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderLine {
    Field { name: String, value: String },
    /// A line without a colon (obsolete folding, garbage)
    Raw { line: String },
}

impl HeaderLine {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Field { name, .. } => Some(name.as_str()),
            Self::Raw { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Field { value, .. } => Some(value.as_str()),
            Self::Raw { .. } => None,
        }
    }

    /// Case-insensitive name match, ignoring whitespace around the name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name()
            .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusLine {
    pub(crate) text: String,
    pub(crate) code: Option<u16>,
    /// `<scheme>/<digit>.<digit> <3 digits>` at the start of the line
    pub(crate) valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Head {
    pub(crate) status: StatusLine,
    pub(crate) headers: Vec<HeaderLine>,
}

/// A parsed response exchange, complete or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status_line: String,
    pub status_code: Option<u16>,
    pub status_line_valid: bool,
    pub headers: Vec<HeaderLine>,
    /// Body bytes, de-chunked when the chunked coding was used
    pub body: Vec<u8>,
    pub truncated: bool,
    pub outcome: FramingOutcome,
    pub detail: Option<String>,
    /// Everything received on the connection
    pub raw: Vec<u8>,
    /// Offset in `raw` just past the logical end of the response
    pub frame_end: usize,
}

impl RawResponse {
    /// First header with this name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is_named(name))
            .and_then(HeaderLine::value)
    }

    /// Every header with this name, in order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.is_named(name))
            .filter_map(HeaderLine::value)
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn bytes_received(&self) -> usize {
        self.raw.len()
    }

    /// Bytes after the logical end of the response.
    pub fn unconsumed(&self) -> &[u8] {
        self.raw.get(self.frame_end..).unwrap_or_default()
    }
}

/// Parse a complete byte sequence as one response exchange.
///
/// The bytes are run through a [`Framer`] first, with the end of input taken
/// as connection close, so the outcome reflects the response's own framing.
#[must_use]
pub fn parse(raw: &[u8]) -> RawResponse {
    let limits = FrameLimits {
        max_header_bytes: raw.len(),
        max_response_bytes: raw.len(),
    };
    let mut framer = Framer::new(limits, false);
    framer.feed(raw);
    framer.finish_eof();
    parse_framed(framer.into_framed())
}

/// Split framed bytes into status line, headers and body.
#[must_use]
pub fn parse_framed(framed: Framed) -> RawResponse {
    let (head, body) = match framed.head_end {
        Some(end) => (
            &framed.bytes[..end],
            framed.bytes.get(end..framed.frame_end.max(end)).unwrap_or_default(),
        ),
        None => (framed.bytes.as_slice(), &[][..]),
    };
    let parsed = parse_head(head);
    let body = match framed.chunked_body {
        Some(decoded) => decoded,
        None => body.to_vec(),
    };

    RawResponse {
        status_line: parsed.status.text,
        status_code: parsed.status.code,
        status_line_valid: parsed.status.valid,
        headers: parsed.headers,
        body,
        truncated: framed.truncated,
        outcome: framed.outcome,
        detail: framed.detail,
        frame_end: framed.frame_end,
        raw: framed.bytes,
    }
}

/// Status line and header lines of a head section (terminator optional).
pub(crate) fn parse_head(head: &[u8]) -> Head {
    let text = String::from_utf8_lossy(head);
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let status = parse_status_line(lines.next().unwrap_or_default());
    let headers = lines
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(':') {
            Some((name, value)) => HeaderLine::Field {
                name: name.to_string(),
                value: value.trim().to_string(),
            },
            None => HeaderLine::Raw {
                line: line.to_string(),
            },
        })
        .collect();

    Head { status, headers }
}

fn parse_status_line(line: &str) -> StatusLine {
    let mut tokens = line.split_ascii_whitespace();
    let version = tokens.next();
    let code = tokens
        .next()
        .filter(|t| t.len() == 3 && t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse().ok());
    let valid = code.is_some()
        && version.is_some_and(|v| line.starts_with(v) && is_version_token(v));

    StatusLine {
        text: line.to_string(),
        code,
        valid,
    }
}

fn is_version_token(token: &str) -> bool {
    let Some((scheme, number)) = token.split_once('/') else {
        return false;
    };
    let number = number.as_bytes();
    !scheme.is_empty()
        && scheme.bytes().all(|b| b.is_ascii_alphabetic())
        && number.len() == 3
        && number[0].is_ascii_digit()
        && number[1] == b'.'
        && number[2].is_ascii_digit()
}
