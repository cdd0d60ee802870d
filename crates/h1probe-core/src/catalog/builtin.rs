//! Built-in suites
//!
//! `rfc` covers request-line, header and framing edge cases of RFC 9112.
//! Expected codes are what a strict origin server returns; alternatives are
//! what lenient but still safe servers commonly answer.
//! `smuggling` sends requests whose length is ambiguous and fails any server
//! that answers with more than one response.
//! `status` walks the 2xx to 5xx classes with ordinary and hostile requests
//! against a static-file origin.

use std::time::Duration;

use crate::case::{Expectation, TestCase};

use super::CatalogError;
use super::status::status_suite;

/// Suites that need no parameters
pub const BUILTIN_SUITES: [&str; 3] = ["rfc", "smuggling", "status"];

const SLOW: Duration = Duration::from_secs(2);

/// Cases of a parameterless built-in suite.
pub fn builtin(name: &str) -> Result<Vec<TestCase>, CatalogError> {
    match name {
        "rfc" => Ok(rfc()),
        "smuggling" => Ok(smuggling()),
        "status" => Ok(status_suite()),
        other => Err(CatalogError::UnknownSuite(other.to_string())),
    }
}

fn case(category: &str, name: &str, raw: &[u8], expected: u16, alternatives: &[u16]) -> TestCase {
    TestCase::raw(
        name,
        category,
        raw,
        Expectation::exactly(expected).or(alternatives.iter().copied()),
    )
}

fn rfc() -> Vec<TestCase> {
    let mut cases = Vec::new();
    cases.extend(line_endings());
    cases.extend(whitespace());
    cases.extend(headers());
    cases.extend(methods());
    cases.extend(uris());
    cases.extend(versions());
    cases.extend(content_length());
    cases.extend(host());
    cases.extend(connection());
    cases.extend(special());
    cases.extend(control_characters());
    cases
}

fn line_endings() -> Vec<TestCase> {
    let c = "Line Endings";
    vec![
        case(c, "Standard CRLF", b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n", 200, &[]),
        case(c, "LF only", b"GET / HTTP/1.1\nHost: localhost\n\n", 200, &[400]),
        case(c, "Mixed CRLF and LF", b"GET / HTTP/1.1\r\nHost: localhost\n\r\n", 200, &[400]),
        case(c, "CR only", b"GET / HTTP/1.1\rHost: localhost\r\r", 400, &[200]),
        case(
            c,
            "Extra CRLF before request",
            b"\r\n\r\nGET / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[200],
        ),
        case(c, "Missing final CRLF", b"GET / HTTP/1.1\r\nHost: localhost\r\n", 400, &[200])
            .with_timeout(SLOW),
    ]
}

fn whitespace() -> Vec<TestCase> {
    let c = "Whitespace";
    vec![
        case(
            c,
            "Leading space before method",
            b" GET / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[],
        ),
        case(
            c,
            "Trailing space after version",
            b"GET / HTTP/1.1 \r\nHost: localhost\r\n\r\n",
            200,
            &[400],
        ),
        case(
            c,
            "Multiple spaces between tokens",
            b"GET  /  HTTP/1.1\r\nHost: localhost\r\n\r\n",
            200,
            &[400],
        ),
        case(
            c,
            "Tab instead of space",
            b"GET\t/\tHTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[200],
        ),
        case(
            c,
            "Leading space in header value",
            b"GET / HTTP/1.1\r\nHost:  localhost\r\n\r\n",
            200,
            &[],
        ),
        case(
            c,
            "Trailing space in header value",
            b"GET / HTTP/1.1\r\nHost: localhost \r\n\r\n",
            200,
            &[],
        ),
    ]
}

fn headers() -> Vec<TestCase> {
    let c = "Header Edge Cases";
    let long_name = format!(
        "GET / HTTP/1.1\r\nHost: localhost\r\nX-{}: value\r\n\r\n",
        "a".repeat(500)
    );
    let long_value = format!(
        "GET / HTTP/1.1\r\nHost: localhost\r\nX-Long: {}\r\n\r\n",
        "x".repeat(8000)
    );
    vec![
        case(
            c,
            "Empty header value",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nX-Empty:\r\n\r\n",
            200,
            &[400],
        ),
        case(
            c,
            "Header with only spaces",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nX-Spaces:   \r\n\r\n",
            200,
            &[400],
        ),
        case(c, "Very long header name", long_name.as_bytes(), 200, &[400, 431]),
        case(c, "Very long header value", long_value.as_bytes(), 200, &[400, 431]),
        case(
            c,
            "Header line folding (obsolete)",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nX-Folded: value1\r\n continuation\r\n\r\n",
            400,
            &[200],
        ),
        case(
            c,
            "Duplicate Host headers",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nHost: example.com\r\n\r\n",
            400,
            &[200],
        ),
        case(
            c,
            "Header with space in name",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nInvalid Name: value\r\n\r\n",
            400,
            &[200],
        ),
        case(
            c,
            "Header with tab in name",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nTab\tin\tname: value\r\n\r\n",
            400,
            &[200],
        ),
        case(
            c,
            "Header without colon",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nInvalidHeader\r\n\r\n",
            400,
            &[200],
        ),
        case(
            c,
            "Empty header name",
            b"GET / HTTP/1.1\r\nHost: localhost\r\n: value\r\n\r\n",
            400,
            &[200],
        ),
    ]
}

fn methods() -> Vec<TestCase> {
    let c = "Methods";
    let long_method = format!(
        "VERYLONGMETHODNAME{} / HTTP/1.1\r\nHost: localhost\r\n\r\n",
        "X".repeat(100)
    );
    vec![
        case(c, "Lowercase method", b"get / HTTP/1.1\r\nHost: localhost\r\n\r\n", 400, &[501, 200]),
        case(
            c,
            "Mixed case method",
            b"Get / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[501, 200],
        ),
        case(c, "Empty method", b" / HTTP/1.1\r\nHost: localhost\r\n\r\n", 400, &[]),
        case(c, "Very long method", long_method.as_bytes(), 400, &[501]),
        case(
            c,
            "Method with hyphen",
            b"GET-CUSTOM / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[501],
        ),
    ]
}

fn uris() -> Vec<TestCase> {
    let c = "URIs";
    vec![
        case(c, "Empty URI", b"GET  HTTP/1.1\r\nHost: localhost\r\n\r\n", 400, &[]),
        case(
            c,
            "URI with spaces",
            b"GET /test file.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404],
        ),
        case(
            c,
            "URI with null byte",
            b"GET /test\x00file.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404],
        ),
        case(c, "Asterisk URI", b"OPTIONS * HTTP/1.1\r\nHost: localhost\r\n\r\n", 200, &[501, 400]),
        case(
            c,
            "Authority form URI",
            b"CONNECT localhost:8080 HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[501, 405],
        ),
        case(
            c,
            "Absolute URI",
            b"GET http://localhost/ HTTP/1.1\r\nHost: localhost\r\n\r\n",
            200,
            &[400],
        ),
        case(
            c,
            "URI with fragment",
            b"GET /index.html#section HTTP/1.1\r\nHost: localhost\r\n\r\n",
            200,
            &[],
        ),
        case(
            c,
            "Double slash in path",
            b"GET //index.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
            200,
            &[404],
        ),
        case(
            c,
            "Path with backslash",
            b"GET /test\\file.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
            404,
            &[400],
        ),
    ]
}

fn versions() -> Vec<TestCase> {
    let c = "Versions";
    vec![
        case(c, "HTTP/0.9", b"GET /\r\n", 200, &[400, 505]),
        case(c, "HTTP/1.0", b"GET / HTTP/1.0\r\n\r\n", 200, &[]),
        case(c, "Lowercase http", b"GET / http/1.1\r\nHost: localhost\r\n\r\n", 400, &[200]),
        case(c, "Missing minor version", b"GET / HTTP/1\r\nHost: localhost\r\n\r\n", 400, &[200]),
        case(c, "HTTP/1.1.0", b"GET / HTTP/1.1.0\r\nHost: localhost\r\n\r\n", 400, &[200]),
        case(c, "HTTP/1.1 without Host", b"GET / HTTP/1.1\r\n\r\n", 400, &[200]),
    ]
}

fn content_length() -> Vec<TestCase> {
    let c = "Content-Length";
    vec![
        case(
            c,
            "Zero Content-Length with body",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\nBODY",
            201,
            &[200, 204, 400],
        ),
        case(
            c,
            "Negative Content-Length",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: -10\r\n\r\n",
            400,
            &[],
        ),
        case(
            c,
            "Non-numeric Content-Length",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: abc\r\n\r\n",
            400,
            &[],
        ),
        case(
            c,
            "Duplicate Content-Length (same)",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\n\
              Content-Length: 4\r\n\r\ntest",
            400,
            &[201, 200],
        ),
        case(
            c,
            "Duplicate Content-Length (different)",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\n\
              Content-Length: 10\r\n\r\ntest",
            400,
            &[],
        ),
        case(
            c,
            "Very large Content-Length",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 999999999999\r\n\r\n",
            413,
            &[400],
        )
        .with_timeout(SLOW),
        case(
            c,
            "Declared length longer than body",
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 50\r\n\r\n0123456789",
            400,
            &[408],
        )
        .with_timeout(SLOW),
    ]
}

fn host() -> Vec<TestCase> {
    let c = "Host Header";
    vec![
        case(c, "Host with port", b"GET / HTTP/1.1\r\nHost: localhost:8080\r\n\r\n", 200, &[]),
        case(c, "Host with IPv4", b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", 200, &[]),
        case(c, "Host with IPv6", b"GET / HTTP/1.1\r\nHost: [::1]\r\n\r\n", 200, &[400]),
        case(c, "Empty Host value", b"GET / HTTP/1.1\r\nHost:\r\n\r\n", 400, &[200]),
        case(c, "Host with spaces", b"GET / HTTP/1.1\r\nHost: local host\r\n\r\n", 400, &[200]),
    ]
}

fn connection() -> Vec<TestCase> {
    let c = "Connection Header";
    vec![
        case(
            c,
            "Connection: close",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            200,
            &[],
        ),
        case(
            c,
            "Connection: keep-alive",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n",
            200,
            &[],
        ),
        case(
            c,
            "Connection: upgrade",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: upgrade\r\n\r\n",
            200,
            &[426, 400],
        ),
        case(
            c,
            "Connection: keep-alive, Upgrade",
            b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive, Upgrade\r\n\r\n",
            200,
            &[400],
        ),
    ]
}

fn special() -> Vec<TestCase> {
    let c = "Special Requests";
    vec![
        case(
            c,
            "Query string only",
            b"GET ?query=value HTTP/1.1\r\nHost: localhost\r\n\r\n",
            404,
            &[200, 400],
        ),
        case(
            c,
            "Fragment only",
            b"GET #anchor HTTP/1.1\r\nHost: localhost\r\n\r\n",
            404,
            &[200, 400],
        ),
        case(c, "HEAD request", b"HEAD / HTTP/1.1\r\nHost: localhost\r\n\r\n", 200, &[501]),
        case(
            c,
            "OPTIONS request",
            b"OPTIONS / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            200,
            &[501, 405],
        ),
        case(c, "TRACE request", b"TRACE / HTTP/1.1\r\nHost: localhost\r\n\r\n", 405, &[501, 200]),
    ]
}

/// Raw control bytes inside the request target.
fn control_characters() -> Vec<TestCase> {
    let c = "Control Characters";
    vec![
        case(
            c,
            "Encoded null in path",
            b"GET /test%00.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404, 200],
        ),
        case(
            c,
            "Raw null in path",
            b"GET /test\x00.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404],
        ),
        case(
            c,
            "Encoded CRLF in path",
            b"GET /test%0d%0a HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404, 200],
        ),
        case(
            c,
            "Raw CRLF in path",
            b"GET /test\r\n HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404],
        )
        .with_timeout(SLOW),
        case(
            c,
            "Encoded LF in path",
            b"GET /test%0a HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404, 200],
        ),
        case(c, "Raw LF in path", b"GET /test\n HTTP/1.1\r\nHost: localhost\r\n\r\n", 400, &[404])
            .with_timeout(SLOW),
        case(
            c,
            "Raw DEL in path",
            b"GET /test\x7f HTTP/1.1\r\nHost: localhost\r\n\r\n",
            400,
            &[404],
        ),
    ]
}

fn smuggling() -> Vec<TestCase> {
    let c = "Request Smuggling";
    let lenient: [u16; 7] = [200, 201, 404, 405, 411, 413, 501];
    vec![
        case(
            c,
            "CL.TE conflict",
            b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\n\
              Transfer-Encoding: chunked\r\n\r\n12\r\nSMUGGLED_REQUEST\r\n0\r\n\r\n",
            400,
            &lenient,
        )
        .body_excludes("SMUGGLED")
        .single_response()
        .with_timeout(SLOW),
        case(
            c,
            "TE.CL conflict",
            b"POST / HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\
              Content-Length: 4\r\n\r\n5c\r\nGET /smuggled HTTP/1.1\r\nHost: localhost\r\n\r\n\
              0\r\n\r\n",
            400,
            &lenient,
        )
        .single_response()
        .with_timeout(SLOW),
        case(
            c,
            "Conflicting Content-Length values",
            b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 3\r\n\
              Content-Length: 5\r\n\r\n12345",
            400,
            &[],
        )
        .single_response()
        .with_timeout(SLOW),
        case(
            c,
            "Comma-separated Content-Length",
            b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 3, 5\r\n\r\n12345",
            400,
            &[],
        )
        .single_response()
        .with_timeout(SLOW),
        case(
            c,
            "Chunked upload",
            b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n5\r\n\
              hello\r\n0\r\n\r\n",
            201,
            &lenient,
        )
        .single_response()
        .with_timeout(SLOW),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn suites_resolve_by_name() {
        for name in BUILTIN_SUITES {
            assert!(!builtin(name).unwrap().is_empty(), "{name}");
        }
        assert!(matches!(
            builtin("nope"),
            Err(CatalogError::UnknownSuite(name)) if name == "nope"
        ));
    }

    #[test]
    fn case_names_are_unique_per_suite() {
        for name in BUILTIN_SUITES {
            let cases = builtin(name).unwrap();
            let names: HashSet<&str> = cases.iter().map(TestCase::name).collect();
            assert_eq!(names.len(), cases.len(), "{name}");
        }
    }

    #[test]
    fn rfc_covers_every_category() {
        let cases = builtin("rfc").unwrap();
        let categories: HashSet<&str> = cases.iter().map(TestCase::category).collect();
        for expected in [
            "Line Endings",
            "Whitespace",
            "Header Edge Cases",
            "Methods",
            "URIs",
            "Versions",
            "Content-Length",
            "Host Header",
            "Connection Header",
            "Special Requests",
            "Control Characters",
        ] {
            assert!(categories.contains(expected), "{expected}");
        }
    }

    #[test]
    fn control_character_cases_are_run_not_skipped() {
        let cases = builtin("rfc").unwrap();
        assert!(cases.iter().all(|c| c.skip_reason().is_none()));
        let raw_null = cases
            .iter()
            .find(|c| c.name() == "Raw null in path")
            .unwrap();
        assert!(raw_null.request().contains(&0));
    }

    #[test]
    fn smuggling_cases_require_single_response() {
        assert!(
            builtin("smuggling")
                .unwrap()
                .iter()
                .all(TestCase::expects_single_response)
        );
    }

    #[test]
    fn head_case_is_detected() {
        let cases = builtin("rfc").unwrap();
        let head = cases.iter().find(|c| c.name() == "HEAD request").unwrap();
        assert!(head.is_head());
    }
}
