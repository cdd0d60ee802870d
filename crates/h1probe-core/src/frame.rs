//! Response framer: decides when a full response has arrived
//!
//! The framer is fed bytes as they come off the socket and answers one
//! question: is more data needed? Completion is decided by the response's own
//! framing (`Content-Length`, chunked coding, no-body status, connection
//! close). Time and size ceilings are backstops, applied by the caller through
//! [`Framer::finish_timeout`] and by [`FrameLimits::max_response_bytes`].
//!
//! ```text
//! StatusLine ──\n──▶ Headers ──CRLFCRLF──▶ Body(Length | Chunked | UntilClose) ──▶ Done
//!                       │                        │
//!                       └── oversized ──▶ Done   └── EOF / timeout / ceiling ──▶ Done
//! ```

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::chunked::{ChunkStatus, ChunkedDecoder};
use crate::parse::{HeaderLine, parse_head};

/// How (or whether) a response was judged complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FramingOutcome {
    /// Exactly `Content-Length` body bytes were read
    CompleteByLength,
    /// Zero-size chunk and trailer section were read
    CompleteByChunked,
    /// No explicit framing; the peer closed the connection
    CompleteByClose,
    /// Complete by rule of thumb: no-body status, HEAD, or the byte ceiling
    CompleteByHeuristic,
    /// Budget ran out before the response was complete
    TimedOut,
    /// The server could not be reached at all
    ConnectionRefused,
    /// Ambiguous or broken framing
    Malformed,
}

impl FramingOutcome {
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(
            self,
            Self::CompleteByLength
                | Self::CompleteByChunked
                | Self::CompleteByClose
                | Self::CompleteByHeuristic
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompleteByLength => "complete_by_length",
            Self::CompleteByChunked => "complete_by_chunked",
            Self::CompleteByClose => "complete_by_close",
            Self::CompleteByHeuristic => "complete_by_heuristic",
            Self::TimedOut => "timed_out",
            Self::ConnectionRefused => "connection_refused",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FramingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte ceilings that bound every framing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Status line plus header section
    pub max_header_bytes: usize,
    /// Everything buffered for one response
    pub max_response_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_response_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    NeedMore,
    Complete,
}

#[derive(Debug)]
enum Phase {
    StatusLine,
    Headers,
    Body(Body),
    Done,
}

#[derive(Debug)]
enum Body {
    /// Complete once the buffer reaches `end`
    Length { end: usize },
    Chunked {
        decoder: ChunkedDecoder,
        cursor: usize,
    },
    UntilClose,
}

enum Step {
    Wait,
    Enter(Phase),
    Resolve {
        outcome: FramingOutcome,
        end: usize,
        detail: Option<String>,
    },
}

impl Step {
    fn oversized(limit: usize, end: usize) -> Self {
        Self::Resolve {
            outcome: FramingOutcome::Malformed,
            end,
            detail: Some(format!("header section exceeds {limit} bytes")),
        }
    }
}

#[derive(Debug)]
struct Resolution {
    outcome: FramingOutcome,
    frame_end: usize,
    detail: Option<String>,
}

/// Incremental framing state machine for one response.
#[derive(Debug)]
pub struct Framer {
    limits: FrameLimits,
    head_request: bool,
    buf: Vec<u8>,
    phase: Phase,
    /// Header terminator search resumes here
    scanned: usize,
    head_end: Option<usize>,
    truncated: bool,
    chunked_body: Option<Vec<u8>>,
    resolution: Option<Resolution>,
}

impl Framer {
    /// `head_request` makes every response complete at its header terminator.
    #[must_use]
    pub fn new(limits: FrameLimits, head_request: bool) -> Self {
        Self {
            limits,
            head_request,
            buf: Vec::new(),
            phase: Phase::StatusLine,
            scanned: 0,
            head_end: None,
            truncated: false,
            chunked_body: None,
            resolution: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn outcome(&self) -> Option<FramingOutcome> {
        self.resolution.as_ref().map(|r| r.outcome)
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Room left under the response ceiling.
    pub fn remaining_capacity(&self) -> usize {
        self.limits.max_response_bytes.saturating_sub(self.buf.len())
    }

    /// Append received bytes and advance as far as they allow.
    ///
    /// Bytes fed after completion are kept (within the ceiling) as unconsumed
    /// trailing data without changing the outcome.
    pub fn feed(&mut self, data: &[u8]) -> Progress {
        let room = self.remaining_capacity();
        let overflow = data.len() > room;
        self.buf.extend_from_slice(&data[..data.len().min(room)]);

        if self.is_done() {
            return Progress::Complete;
        }

        self.advance();

        if !self.is_done() && overflow {
            let end = self.buf.len();
            let limit = self.limits.max_response_bytes;
            self.truncated = true;
            self.resolve(
                FramingOutcome::CompleteByHeuristic,
                end,
                Some(format!("response exceeded {limit} bytes")),
            );
        }

        self.progress()
    }

    /// The peer closed the connection.
    pub fn finish_eof(&mut self) {
        let len = self.buf.len();
        let body_start = self.head_end.unwrap_or(0);
        let (outcome, detail) = match &self.phase {
            Phase::Done => return,
            Phase::StatusLine | Phase::Headers if len == 0 => (
                FramingOutcome::Malformed,
                Some("peer closed the connection without sending a response".to_string()),
            ),
            Phase::StatusLine | Phase::Headers => (
                FramingOutcome::Malformed,
                Some(format!(
                    "peer closed the connection inside the header section after {len} bytes"
                )),
            ),
            Phase::Body(Body::Length { end }) => (
                FramingOutcome::Malformed,
                Some(format!(
                    "peer closed the connection after {} of {} body bytes",
                    len - body_start,
                    end - body_start
                )),
            ),
            Phase::Body(Body::Chunked { .. }) => (
                FramingOutcome::Malformed,
                Some("peer closed the connection inside a chunked body".to_string()),
            ),
            Phase::Body(Body::UntilClose) => (FramingOutcome::CompleteByClose, None),
        };
        self.resolve(outcome, len, detail);
    }

    /// The time budget ran out. Whatever arrived is kept.
    pub fn finish_timeout(&mut self) {
        if self.is_done() {
            return;
        }
        let len = self.buf.len();
        let detail = if len == 0 {
            "no data received before the deadline".to_string()
        } else {
            format!("response incomplete after {len} bytes")
        };
        self.resolve(FramingOutcome::TimedOut, len, Some(detail));
    }

    /// Hand the framed bytes to the parser. An unresolved framer counts as timed out.
    #[must_use]
    pub fn into_framed(mut self) -> Framed {
        self.finish_timeout();
        let resolution = self.resolution.unwrap_or(Resolution {
            outcome: FramingOutcome::TimedOut,
            frame_end: self.buf.len(),
            detail: None,
        });
        Framed {
            bytes: self.buf,
            outcome: resolution.outcome,
            truncated: self.truncated,
            head_end: self.head_end,
            frame_end: resolution.frame_end,
            chunked_body: self.chunked_body,
            detail: resolution.detail,
        }
    }

    fn progress(&self) -> Progress {
        if self.is_done() {
            Progress::Complete
        } else {
            Progress::NeedMore
        }
    }

    fn advance(&mut self) {
        loop {
            let max_header = self.limits.max_header_bytes;
            let step = match &mut self.phase {
                Phase::Done => return,
                Phase::StatusLine => {
                    if self.buf.contains(&b'\n') {
                        Step::Enter(Phase::Headers)
                    } else if self.buf.len() > max_header {
                        Step::oversized(max_header, self.buf.len())
                    } else {
                        Step::Wait
                    }
                }
                Phase::Headers => match find_head_end(&self.buf, self.scanned) {
                    Some(end) if end > max_header => {
                        Step::oversized(max_header, self.buf.len())
                    }
                    Some(end) => {
                        self.head_end = Some(end);
                        select_body(&self.buf[..end], self.head_request)
                    }
                    None => {
                        self.scanned = self.buf.len().saturating_sub(2);
                        if self.buf.len() > max_header {
                            Step::oversized(max_header, self.buf.len())
                        } else {
                            Step::Wait
                        }
                    }
                },
                Phase::Body(Body::Length { end }) => {
                    if self.buf.len() >= *end {
                        Step::Resolve {
                            outcome: FramingOutcome::CompleteByLength,
                            end: *end,
                            detail: None,
                        }
                    } else {
                        Step::Wait
                    }
                }
                Phase::Body(Body::Chunked { decoder, cursor }) => {
                    match decoder.advance(&self.buf, cursor) {
                        Ok(ChunkStatus::Done) => Step::Resolve {
                            outcome: FramingOutcome::CompleteByChunked,
                            end: *cursor,
                            detail: None,
                        },
                        Ok(ChunkStatus::NeedMore) => Step::Wait,
                        Err(e) => Step::Resolve {
                            outcome: FramingOutcome::Malformed,
                            end: self.buf.len(),
                            detail: Some(e.to_string()),
                        },
                    }
                }
                Phase::Body(Body::UntilClose) => Step::Wait,
            };

            match step {
                Step::Wait => return,
                Step::Enter(phase) => self.phase = phase,
                Step::Resolve {
                    outcome,
                    end,
                    detail,
                } => {
                    self.resolve(outcome, end, detail);
                    return;
                }
            }
        }
    }

    fn resolve(&mut self, outcome: FramingOutcome, frame_end: usize, detail: Option<String>) {
        let previous = std::mem::replace(&mut self.phase, Phase::Done);
        if let Phase::Body(Body::Chunked { decoder, .. }) = previous {
            self.chunked_body = Some(decoder.into_body());
        }
        self.resolution = Some(Resolution {
            outcome,
            frame_end,
            detail,
        });
    }
}

/// Bytes of one response exchange, with the framer's verdict on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framed {
    /// Everything received, including bytes after the logical end
    pub bytes: Vec<u8>,
    pub outcome: FramingOutcome,
    /// The response ceiling cut the read short
    pub truncated: bool,
    /// Offset just past the header terminator, if one was seen
    pub head_end: Option<usize>,
    /// Offset just past the logical end of the response
    pub frame_end: usize,
    /// De-chunked payload when the body used the chunked coding
    pub chunked_body: Option<Vec<u8>>,
    pub detail: Option<String>,
}

impl Framed {
    /// The server could not be reached; nothing was received.
    pub fn refused(detail: impl Into<String>) -> Self {
        Self {
            bytes: Vec::new(),
            outcome: FramingOutcome::ConnectionRefused,
            truncated: false,
            head_end: None,
            frame_end: 0,
            chunked_body: None,
            detail: Some(detail.into()),
        }
    }

    /// Bytes that arrived after the response ended (pipelined or smuggled data).
    pub fn unconsumed(&self) -> &[u8] {
        self.bytes.get(self.frame_end..).unwrap_or_default()
    }
}

/// Offset just past the first blank line (`\n\n` or `\n\r\n`) at or after `from`.
fn find_head_end(buf: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while let Some(offset) = buf.get(i..)?.iter().position(|&b| b == b'\n') {
        let nl = i + offset;
        match (buf.get(nl + 1), buf.get(nl + 2)) {
            (Some(b'\n'), _) => return Some(nl + 2),
            (Some(b'\r'), Some(b'\n')) => return Some(nl + 3),
            _ => i = nl + 1,
        }
    }
    None
}

fn select_body(head: &[u8], head_request: bool) -> Step {
    let end = head.len();
    let parsed = parse_head(head);

    if head_request || has_no_body(parsed.status.code) {
        return Step::Resolve {
            outcome: FramingOutcome::CompleteByHeuristic,
            end,
            detail: None,
        };
    }

    match content_length(&parsed.headers) {
        Some(Ok(length)) => match end.checked_add(length) {
            Some(body_end) => Step::Enter(Phase::Body(Body::Length { end: body_end })),
            None => Step::Resolve {
                outcome: FramingOutcome::Malformed,
                end,
                detail: Some(format!("Content-Length {length} overflows")),
            },
        },
        Some(Err(detail)) => Step::Resolve {
            outcome: FramingOutcome::Malformed,
            end,
            detail: Some(detail),
        },
        None if is_chunked(&parsed.headers) => Step::Enter(Phase::Body(Body::Chunked {
            decoder: ChunkedDecoder::new(),
            cursor: end,
        })),
        None => Step::Enter(Phase::Body(Body::UntilClose)),
    }
}

fn has_no_body(status: Option<u16>) -> bool {
    matches!(status, Some(100..=199 | 204 | 304))
}

/// Declared body length. Every value, across repeated headers and
/// comma-separated lists, must be numeric and agree.
fn content_length(headers: &[HeaderLine]) -> Option<Result<usize, String>> {
    let mut values = headers
        .iter()
        .filter(|h| h.is_named("content-length"))
        .filter_map(HeaderLine::value)
        .flat_map(|v| v.split(','))
        .map(str::trim);

    let first = values.next()?;
    Some(parse_length(first).and_then(|length| {
        values.try_fold(length, |length, value| {
            let other = parse_length(value)?;
            if other == length {
                Ok(length)
            } else {
                Err(format!(
                    "conflicting Content-Length values {length} and {other}"
                ))
            }
        })
    }))
}

fn parse_length(value: &str) -> Result<usize, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("non-numeric Content-Length {value:?}"));
    }
    value
        .parse()
        .map_err(|_| format!("Content-Length {value} out of range"))
}

fn is_chunked(headers: &[HeaderLine]) -> bool {
    headers
        .iter()
        .filter(|h| h.is_named("transfer-encoding"))
        .filter_map(HeaderLine::value)
        .flat_map(|v| v.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}
