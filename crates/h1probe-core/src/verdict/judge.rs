//! Expectation matching
//!
//! [`evaluate`] compares a bare status code against an [`Expectation`].
//! [`judge`] wraps it with everything else a received response can fail on:
//! the framing outcome, caller-supplied body checks, and a second response
//! hiding behind the first.

use crate::case::{Expectation, TestCase};
use crate::frame::FramingOutcome;
use crate::parse::RawResponse;

use super::MatchOutcome;

/// Compare a status code with the accepted set.
///
/// An absent status always fails; it is never skipped.
#[must_use]
pub fn evaluate(actual: Option<u16>, expectation: &Expectation) -> MatchOutcome {
    match actual {
        None => MatchOutcome::fail(
            None,
            format!("{}, got no status code", describe(expectation)),
        ),
        Some(status) if status == expectation.expected => {
            MatchOutcome::pass(status, format!("got {status}"))
        }
        Some(status) if expectation.accepts(status) => MatchOutcome::pass(
            status,
            format!("got {status} (accepted alternative to {})", expectation.expected),
        ),
        Some(status) => MatchOutcome::fail(
            Some(status),
            format!("{}, got {status}", describe(expectation)),
        ),
    }
}

/// Judge one case against the response it received.
#[must_use]
pub fn judge(case: &TestCase, response: &RawResponse) -> MatchOutcome {
    if let Some(reason) = case.skip_reason() {
        return MatchOutcome::skip(reason);
    }

    let actual = response.status_code;
    let received = response.bytes_received();
    let detail = response.detail.as_deref().unwrap_or("no detail");

    if response.outcome == FramingOutcome::ConnectionRefused {
        return MatchOutcome::fail(None, format!("connection refused: {detail}"));
    }
    if actual.is_none() {
        return MatchOutcome::fail(
            None,
            format!(
                "no status code in response ({}, {received} bytes received)",
                response.outcome
            ),
        );
    }
    match response.outcome {
        FramingOutcome::TimedOut => {
            return MatchOutcome::fail(
                actual,
                format!("timed out with {received} bytes received: {detail}"),
            );
        }
        FramingOutcome::Malformed if !case.tolerates_malformed() => {
            return MatchOutcome::fail(actual, format!("malformed response: {detail}"));
        }
        _ => {}
    }

    let outcome = evaluate(actual, case.expectation());
    if !outcome.is_pass() {
        return outcome;
    }

    let body = response.body_text();
    if let Some(needle) = case
        .required_substrings()
        .iter()
        .find(|needle| !body.contains(needle.as_str()))
    {
        return MatchOutcome::fail(actual, format!("body does not contain {needle:?}"));
    }
    if let Some(needle) = case
        .forbidden_substrings()
        .iter()
        .find(|needle| body.contains(needle.as_str()))
    {
        return MatchOutcome::fail(actual, format!("body contains {needle:?}"));
    }

    if case.expects_single_response() {
        let trailing = response.unconsumed();
        if contains(trailing, b"HTTP/") {
            return MatchOutcome::fail(
                actual,
                format!(
                    "second response follows the first ({} trailing bytes)",
                    trailing.len()
                ),
            );
        }
    }

    outcome
}

fn describe(expectation: &Expectation) -> String {
    if expectation.alternatives.is_empty() {
        format!("expected {}", expectation.expected)
    } else {
        let alts: Vec<String> = expectation
            .alternatives
            .iter()
            .map(u16::to_string)
            .collect();
        format!(
            "expected {} (or one of [{}])",
            expectation.expected,
            alts.join(", ")
        )
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
