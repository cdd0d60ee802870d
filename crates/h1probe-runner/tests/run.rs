//! Runner against local fixture servers

mod fixtures;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use h1probe_core::{Config, Expectation, FramingOutcome, RunState, TestCase, Verdict};
use h1probe_runner::exchange::execute;
use h1probe_runner::runner::ABORTED_REASON;
use h1probe_runner::{RunError, Runner, Settings, StopHandle};

fn config(port: u16) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port,
        timeout: 2.0,
        ..Config::default()
    }
}

fn get(name: &str, path: &str, expected: u16) -> TestCase {
    TestCase::raw(
        name,
        "fixture",
        format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"),
        Expectation::exactly(expected),
    )
}

#[test]
fn concurrent_run_records_every_case_once() {
    let server = fixtures::always_200();
    let cases: Vec<TestCase> = (0..24).map(|i| get(&format!("case {i}"), "/", 200)).collect();

    let ledger = Runner::from_config(&config(server.port))
        .with_concurrency(6)
        .run(&cases)
        .unwrap();

    assert_eq!(ledger.state(), RunState::Completed);
    assert_eq!(ledger.totals().passed, 24);
    assert_eq!(ledger.totals().total, 24);
    let indices: Vec<usize> = ledger.entries().iter().map(|e| e.index).collect();
    assert_eq!(indices, (0..24).collect::<Vec<_>>());
    let names: HashSet<&str> = ledger.entries().iter().map(|e| e.case.name()).collect();
    assert_eq!(names.len(), 24);
    assert_eq!(ledger.exit_code(), 0);
}

#[test]
fn mixed_verdicts_are_tallied() {
    let server = fixtures::echo_status();
    let cases = vec![
        get("ok", "/200", 200),
        get("alt", "/501", 400).skipped("known to hang"),
        get("wrong", "/404", 200),
        TestCase::raw(
            "alternative",
            "other",
            "GET /501 HTTP/1.1\r\nHost: localhost\r\n\r\n",
            Expectation::exactly(400).or([501]),
        ),
    ];

    let ledger = Runner::from_config(&config(server.port))
        .run(&cases)
        .unwrap();

    let verdicts: Vec<Verdict> = ledger.entries().iter().map(|e| e.verdict()).collect();
    assert_eq!(
        verdicts,
        vec![Verdict::Pass, Verdict::Skip, Verdict::Fail, Verdict::Pass]
    );
    let fixture = ledger.categories()["fixture"];
    assert_eq!((fixture.passed, fixture.failed, fixture.skipped), (1, 1, 1));
    assert_eq!(ledger.categories()["other"].passed, 1);
    let failure = ledger.failures().next().unwrap();
    assert_eq!(failure.outcome.message, "expected 200, got 404");
    assert_eq!(ledger.exit_code(), 1);
}

#[test]
fn close_terminated_body_is_complete() {
    let server = fixtures::close_terminated();
    let settings = Settings::from_config(&config(server.port));

    let exchange = execute(&get("bye", "/", 200), &settings);

    assert_eq!(exchange.response.outcome, FramingOutcome::CompleteByClose);
    assert_eq!(exchange.response.body, b"Bye");
    assert_eq!(exchange.response.status_code, Some(200));
}

#[test]
fn silent_server_times_out_within_budget() {
    let server = fixtures::silent();
    let settings = Settings::from_config(&config(server.port));
    let case = get("silent", "/", 200).with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let exchange = execute(&case, &settings);

    assert_eq!(exchange.response.outcome, FramingOutcome::TimedOut);
    assert!(exchange.response.raw.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn endless_stream_is_truncated_at_ceiling() {
    let server = fixtures::endless();
    let mut cfg = config(server.port);
    cfg.max_response_bytes = 64 * 1024;
    cfg.max_header_bytes = 1024;
    let settings = Settings::from_config(&cfg);

    let exchange = execute(&get("endless", "/", 200), &settings);

    assert_eq!(exchange.response.outcome, FramingOutcome::CompleteByHeuristic);
    assert!(exchange.response.truncated);
    assert_eq!(exchange.response.bytes_received(), 64 * 1024);
}

#[test]
fn second_response_fails_single_response_case() {
    let server = fixtures::double_response();
    let cases = vec![
        get("lenient", "/", 400),
        get("strict", "/", 400).single_response(),
    ];

    let ledger = Runner::from_config(&config(server.port))
        .with_concurrency(1)
        .run(&cases)
        .unwrap();

    assert_eq!(ledger.entries()[0].verdict(), Verdict::Pass);
    let strict = &ledger.entries()[1];
    assert_eq!(strict.verdict(), Verdict::Fail);
    assert!(strict.diagnostics.as_ref().unwrap().unconsumed_bytes > 0);
}

#[test]
fn unreachable_server_is_fatal_before_any_case() {
    let runner = Runner::from_config(&config(fixtures::closed_port()));
    let result = runner.run(&[get("never", "/", 200)]);
    assert!(matches!(result, Err(RunError::Unreachable { .. })));
}

#[test]
fn stopped_run_is_aborted_but_complete() {
    let server = fixtures::always_200();
    let cases: Vec<TestCase> = (0..10).map(|i| get(&format!("case {i}"), "/", 200)).collect();
    let stop = StopHandle::new();
    stop.stop();

    let ledger = Runner::from_config(&config(server.port))
        .with_stop_handle(stop)
        .run(&cases)
        .unwrap();

    assert_eq!(ledger.state(), RunState::Aborted);
    assert_eq!(ledger.entries().len(), 10);
    assert!(ledger.entries().iter().all(|e| e.verdict() == Verdict::Skip));
    assert!(
        ledger
            .entries()
            .iter()
            .all(|e| e.outcome.message == ABORTED_REASON)
    );
    assert_eq!(ledger.exit_code(), 2);
    // Only the preflight connected.
    std::thread::sleep(Duration::from_millis(100));
    assert!(server.accepted() <= 1);
}

#[test]
fn stop_lets_in_flight_case_finish() {
    let server = fixtures::silent();
    let mut cfg = config(server.port);
    cfg.timeout = 1.0;
    let cases: Vec<TestCase> = (0..5).map(|i| get(&format!("case {i}"), "/", 200)).collect();
    let runner = Runner::from_config(&cfg).with_concurrency(1);
    let stop = runner.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        stop.stop();
    });

    let ledger = runner.run(&cases).unwrap();
    stopper.join().unwrap();

    assert_eq!(ledger.state(), RunState::Aborted);
    let first = &ledger.entries()[0];
    assert_eq!(first.verdict(), Verdict::Fail);
    assert_eq!(
        first.diagnostics.as_ref().unwrap().framing,
        FramingOutcome::TimedOut
    );
    for entry in &ledger.entries()[1..] {
        assert_eq!(entry.verdict(), Verdict::Skip);
        assert_eq!(entry.outcome.message, ABORTED_REASON);
    }
    assert_eq!(ledger.exit_code(), 2);
}

#[test]
fn stop_after_last_case_started_completes() {
    let server = fixtures::silent();
    let mut cfg = config(server.port);
    cfg.timeout = 1.0;
    let runner = Runner::from_config(&cfg).with_concurrency(1);
    let stop = runner.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        stop.stop();
    });

    let ledger = runner.run(&[get("only", "/", 200)]).unwrap();
    stopper.join().unwrap();

    assert_eq!(ledger.state(), RunState::Completed);
    assert_eq!(ledger.entries()[0].verdict(), Verdict::Fail);
    assert_eq!(ledger.exit_code(), 1);
}

#[test]
fn oversized_case_timeout_does_not_abort_run() {
    let server = fixtures::always_200();
    let cases = vec![
        get("huge", "/", 200).with_timeout(Duration::MAX),
        get("normal", "/", 200),
    ];

    let ledger = Runner::from_config(&config(server.port))
        .run(&cases)
        .unwrap();

    assert_eq!(ledger.state(), RunState::Completed);
    assert_eq!(ledger.totals().passed, 2);
}

#[test]
fn skipped_cases_never_connect() {
    let server = fixtures::always_200();
    let cases = vec![get("skip me", "/", 200).skipped("not today")];

    let ledger = Runner::from_config(&config(server.port)).run(&cases).unwrap();

    assert_eq!(ledger.totals().skipped, 1);
    assert_eq!(ledger.state(), RunState::Completed);
    std::thread::sleep(Duration::from_millis(100));
    assert!(server.accepted() <= 1);
}

#[test]
fn rerun_is_deterministic() {
    let server = fixtures::echo_status();
    let cases = vec![get("a", "/404", 404), get("b", "/200", 404)];
    let runner = Runner::from_config(&config(server.port));

    let first = runner.run(&cases).unwrap();
    let second = runner.run(&cases).unwrap();

    let outcomes = |ledger: &h1probe_core::ResultLedger| {
        ledger
            .entries()
            .iter()
            .map(|e| e.outcome.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(outcomes(&first), outcomes(&second));
}
