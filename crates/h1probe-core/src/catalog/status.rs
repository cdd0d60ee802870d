//! `status` suite: one category per status class
//!
//! Paths and methods assume a typical static-file origin with an `/uploads/`
//! directory that accepts POST and DELETE. Alternatives cover servers that
//! lack a given resource or feature.

use std::time::Duration;

use crate::case::{Expectation, TestCase};

const SUCCESS: &str = "2XX Success";
const REDIRECTION: &str = "3XX Redirection";
const CLIENT_ERROR: &str = "4XX Client Errors";
const SERVER_ERROR: &str = "5XX Server Errors";

pub(super) fn status_suite() -> Vec<TestCase> {
    let mut cases = success();
    cases.extend(redirection());
    cases.extend(client_errors());
    cases.extend(server_errors());
    cases
}

fn expect(expected: u16, alternatives: &[u16]) -> Expectation {
    Expectation::exactly(expected).or(alternatives.iter().copied())
}

/// `{method} {target} HTTP/1.1` with a Host header and any extra header lines.
fn request(method: &str, target: &str, extra: &[String]) -> String {
    let mut text = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n");
    for line in extra {
        text.push_str(line);
        text.push_str("\r\n");
    }
    text.push_str("\r\n");
    text
}

fn get(category: &str, name: String, target: &str, expectation: Expectation) -> TestCase {
    TestCase::raw(name, category, request("GET", target, &[]), expectation)
}

fn upload(
    category: &str,
    name: String,
    content_type: &str,
    body: &str,
    expectation: Expectation,
) -> TestCase {
    let head = [
        format!("Content-Type: {content_type}"),
        format!("Content-Length: {}", body.len()),
    ];
    let raw = request("POST", "/uploads/", &head) + body;
    TestCase::raw(name, category, raw, expectation)
}

fn success() -> Vec<TestCase> {
    let c = SUCCESS;
    let mut cases = Vec::new();

    for path in ["/", "/index.html", "/test.html", "/demo.html", "/status.html"] {
        cases.push(get(c, format!("GET {path}"), path, expect(200, &[])));
    }

    for query in [
        "?",
        "?a=1",
        "?a=1&b=2",
        "?test=value",
        "?x=y&z=w",
        "?name=John+Doe",
        "?search=test",
        "?id=123",
        "?page=1&limit=10",
        "?filter=active",
        "?sort=name",
        "?order=asc",
        "?q=search+term",
        "?param1=val1&param2=val2&param3=val3",
        "?empty=",
    ] {
        let target = format!("/index.html{query}");
        cases.push(get(c, format!("GET {target}"), &target, expect(200, &[])));
    }

    for header in [
        "Accept: text/html",
        "Accept: */*",
        "Accept: text/html,application/xhtml+xml",
        "User-Agent: Mozilla/5.0",
        "User-Agent: h1probe/0.1",
        "Accept-Encoding: gzip, deflate",
        "Accept-Language: en-US,en;q=0.9",
        "Cache-Control: no-cache",
        "Cache-Control: max-age=0",
        "Connection: keep-alive",
        "Connection: close",
        "Referer: http://localhost/",
        "DNT: 1",
        "Upgrade-Insecure-Requests: 1",
        "Pragma: no-cache",
    ] {
        let raw = request("GET", "/", &[header.to_string()]);
        cases.push(TestCase::raw(format!("GET with {header}"), c, raw, expect(200, &[])));
    }

    for count in 1..=20 {
        let headers: Vec<String> = (0..count).map(|j| format!("X-Custom-{j}: value-{j}")).collect();
        let raw = request("GET", "/", &headers);
        let name = format!("GET with {count} custom headers");
        cases.push(TestCase::raw(name, c, raw, expect(200, &[])));
    }

    cases.push(TestCase::raw("GET HTTP/1.0", c, "GET / HTTP/1.0\r\n\r\n", expect(200, &[])));

    for target in [
        "/index.html#top",
        "/index.html#section",
        "/index.html?name=John%20Doe",
        "/index.html?search=test%20query",
        "/index.html?special=%21%40%23%24",
        "/index.html?unicode=%C3%A9",
        "/index.html?plus=a+b+c",
    ] {
        cases.push(get(c, format!("GET {target}"), target, expect(200, &[])));
    }

    for i in 0..10 {
        let body = format!("test data {i}").repeat(10);
        let name = format!("POST create resource #{i}");
        cases.push(upload(c, name, "text/plain", &body, expect(201, &[200, 204])));
    }

    for content_type in [
        "text/html",
        "application/json",
        "application/x-www-form-urlencoded",
        "multipart/form-data",
        "application/octet-stream",
        "application/xml",
        "text/xml",
        "text/csv",
        "application/pdf",
    ] {
        let name = format!("POST with {content_type}");
        let e = expect(201, &[200, 204]);
        cases.push(upload(c, name, content_type, "test content", e));
    }

    for i in 0..5 {
        let raw = request("DELETE", &format!("/uploads/test{i}.txt"), &[]);
        let name = format!("DELETE resource #{i}");
        cases.push(TestCase::raw(name, c, raw, expect(204, &[200, 404])));
    }

    cases
}

fn redirection() -> Vec<TestCase> {
    let c = REDIRECTION;
    let mut cases = Vec::new();

    for path in ["/redirect", "/old-page", "/moved", "/deprecated", "/api/v1", "/legacy"] {
        let e = expect(301, &[302, 303, 307, 308, 200, 404]);
        cases.push(get(c, format!("GET {path} (301)"), path, e));
    }

    for dir in ["/docs", "/browse", "/uploads", "/api", "/cgi-bin"] {
        let bare = format!("GET directory {dir} without slash");
        cases.push(get(c, bare, dir, expect(301, &[302, 200, 404])));
        let slashed = format!("{dir}/");
        let name = format!("GET directory {dir}/ with slash");
        cases.push(get(c, name, &slashed, expect(200, &[301, 302, 404])));
    }

    for path in ["/temp", "/temporary", "/session"] {
        let e = expect(302, &[301, 303, 307, 200, 404]);
        cases.push(get(c, format!("GET {path} (302)"), path, e));
    }

    for etag in ["\"abc123\"", "\"def456\"", "\"xyz789\"", "\"version1\"", "\"v2\""] {
        let raw = request("GET", "/index.html", &[format!("If-None-Match: {etag}")]);
        let name = format!("GET with If-None-Match {etag}");
        cases.push(TestCase::raw(name, c, raw, expect(304, &[200])));
    }

    for date in [
        "Mon, 01 Jan 2030 00:00:00 GMT",
        "Tue, 15 Jan 2030 12:00:00 GMT",
        "Wed, 01 Dec 2030 00:00:00 GMT",
    ] {
        let raw = request("GET", "/index.html", &[format!("If-Modified-Since: {date}")]);
        let name = format!("GET with If-Modified-Since {date}");
        cases.push(TestCase::raw(name, c, raw, expect(304, &[200])));
    }

    cases
}

fn client_errors() -> Vec<TestCase> {
    let c = CLIENT_ERROR;
    let mut cases = Vec::new();

    let malformed: [&[u8]; 10] = [
        b"GET\r\n\r\n",
        b"GET / \r\n\r\n",
        b"GET HTTP/1.1\r\n\r\n",
        b"/ HTTP/1.1\r\n\r\n",
        b"GET\r\nHost: localhost\r\n\r\n",
        b"GETHTTP/1.1\r\nHost: localhost\r\n\r\n",
        b"GET  /  HTTP/1.1\r\nHost: localhost\r\n\r\n",
        b"GET /\rHTTP/1.1\r\nHost: localhost\r\n\r\n",
        b"GET / HTTP/1.1\nHost: localhost\n\n",
        b"GET / HTTP/1.1\r\n\r\n\r\n",
    ];
    for (i, raw) in malformed.into_iter().enumerate() {
        let name = format!("Bad request #{}", i + 1);
        cases.push(TestCase::raw(name, c, raw, expect(400, &[])));
    }

    for version in [
        "HTTP/0.9", "HTTP/2.0", "HTTP/3.0", "HTTP/1.2", "HTTP/1", "HTTP/", "HTTP", "http/1.1",
        "HTTPS/1.1",
    ] {
        let raw = format!("GET / {version}\r\nHost: localhost\r\n\r\n");
        let name = format!("Invalid version {version}");
        cases.push(TestCase::raw(name, c, raw, expect(400, &[505, 200])));
    }

    cases.push(TestCase::raw(
        "HTTP/1.1 without Host",
        c,
        "GET / HTTP/1.1\r\n\r\n",
        expect(400, &[200]),
    ));

    for (i, line) in [
        "InvalidHeader",
        "NoColon header",
        ": NoName",
        "Spaces in name: value",
        "Tab\tin\tname: value",
    ]
    .into_iter()
    .enumerate()
    {
        let raw = request("GET", "/", &[line.to_string()]);
        let name = format!("Bad header format #{}", i + 1);
        cases.push(TestCase::raw(name, c, raw, expect(400, &[200])));
    }

    cases.push(
        TestCase::raw(
            "Content-Length longer than body",
            c,
            request("POST", "/uploads/", &["Content-Length: 50".to_string()]) + "0123456789",
            expect(400, &[408]),
        )
        .skipped("server waits for the rest of the declared body"),
    );
    cases.push(
        TestCase::raw(
            "Incomplete request head",
            c,
            "GET / HTTP/1.1\r\nHost: localhost\r\n",
            expect(408, &[400]),
        )
        .skipped("server waits for the end of the header section"),
    );
    cases.push(
        TestCase::raw(
            "POST with 100MB Content-Length",
            c,
            request("POST", "/uploads/", &["Content-Length: 104857600".to_string()]),
            expect(413, &[400]),
        )
        .skipped("server waits for a body that is never sent"),
    );

    for path in [
        "/.htaccess",
        "/.htpasswd",
        "/.git",
        "/.env",
        "/etc/passwd",
        "/etc/shadow",
        "/../../../etc/passwd",
        "/admin",
        "/private",
        "/secret",
        "/.ssh",
        "/config",
        "/.config",
        "/backup",
        "/db",
    ] {
        let e = expect(403, &[404, 400, 200]);
        cases.push(get(c, format!("GET forbidden {path}"), path, e));
    }

    for path in [
        "/nonexistent.html",
        "/missing.txt",
        "/404.php",
        "/no-such-file",
        "/does-not-exist",
        "/random-path",
        "/test/nested/deep/path",
        "/a/b/c/d/e/f",
    ] {
        cases.push(get(c, format!("GET not found {path}"), path, expect(404, &[])));
    }

    for ext in [".xyz", ".abc", ".fake", ".test", ".random"] {
        for i in 0..2 {
            let path = format!("/file{i}{ext}");
            cases.push(get(c, format!("GET {path}"), &path, expect(404, &[])));
        }
    }

    for method in ["PATCH", "TRACE", "CONNECT", "OPTIONS"] {
        for path in ["/", "/index.html", "/uploads/"] {
            let raw = request(method, path, &[]);
            let name = format!("{method} {path}");
            cases.push(TestCase::raw(name, c, raw, expect(405, &[501, 200, 204])));
        }
    }

    for path in ["/", "/index.html", "/uploads/"] {
        let raw = request("PUT", path, &[]);
        cases.push(TestCase::raw(format!("PUT {path}"), c, raw, expect(411, &[405, 501])));
    }

    for method in ["POST", "PATCH"] {
        let raw = request(method, "/uploads/", &[]) + "data";
        let name = format!("{method} without Content-Length");
        cases.push(TestCase::raw(name, c, raw, expect(411, &[400, 201, 200, 501])));
    }

    for length in [1000, 2000, 5000, 8000, 10_000] {
        let path = format!("/path/{}", "a".repeat(length));
        let name = format!("GET with URI length {length}");
        let e = expect(414, &[400, 404]);
        cases.push(get(c, name, &path, e).with_timeout(Duration::from_secs(2)));
    }

    for content_type in [
        "application/x-custom",
        "weird/type",
        "invalid",
        "application/x-executable",
        "application/x-virus",
    ] {
        let name = format!("POST with unsupported {content_type}");
        cases.push(upload(c, name, content_type, "test", expect(415, &[201, 200])));
    }

    for count in [100, 200, 500] {
        let filler = "x".repeat(100);
        let headers: Vec<String> = (0..count).map(|i| format!("X-Test-{i}: {filler}")).collect();
        let raw = request("GET", "/", &headers);
        let name = format!("GET with {count} large headers");
        let case = TestCase::raw(name, c, raw, expect(431, &[400, 200]));
        cases.push(case.with_timeout(Duration::from_secs(3)));
    }

    cases
}

fn server_errors() -> Vec<TestCase> {
    let c = SERVER_ERROR;
    let mut cases = Vec::new();

    for script in ["/cgi-bin/error.py", "/cgi-bin/crash.sh", "/cgi-bin/fail"] {
        cases.push(get(c, format!("GET {script}"), script, expect(500, &[404, 200])));
    }

    for method in [
        "PROPFIND",
        "PROPPATCH",
        "MKCOL",
        "COPY",
        "MOVE",
        "LOCK",
        "UNLOCK",
        "VERSION-CONTROL",
        "REPORT",
        "CHECKOUT",
        "CHECKIN",
        "UNCHECKOUT",
        "MKWORKSPACE",
        "UPDATE",
        "LABEL",
        "MERGE",
        "BASELINE-CONTROL",
        "MKACTIVITY",
        "ORDERPATCH",
        "ACL",
        "SEARCH",
    ] {
        let raw = request(method, "/", &[]);
        cases.push(TestCase::raw(format!("{method} method"), c, raw, expect(501, &[405, 400])));
    }

    for method in ["INVALID", "CUSTOM", "HACK", "EXPLOIT", "TEST", "ABC", "XYZ", "FOO", "BAR"] {
        let raw = request(method, "/", &[]);
        let name = format!("Invalid method {method}");
        cases.push(TestCase::raw(name, c, raw, expect(501, &[400, 405])));
    }

    for version in ["HTTP/0.1", "HTTP/0.5", "HTTP/2.0", "HTTP/2.1", "HTTP/3.0", "HTTP/4.0"] {
        let raw = format!("GET / {version}\r\nHost: localhost\r\n\r\n");
        cases.push(TestCase::raw(format!("Version {version}"), c, raw, expect(505, &[400, 200])));
    }

    cases
}
