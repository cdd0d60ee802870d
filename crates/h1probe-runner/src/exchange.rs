//! One case, one connection: transport → framer → parser → matcher

use std::time::{Duration, Instant};

use h1probe_core::{
    Config, Diagnostics, FrameLimits, Framed, Framer, FramingOutcome, LedgerEntry, MAX_TIMEOUT,
    MatchOutcome, Progress, RawResponse, TestCase, judge, parse_framed,
};
use tracing::{debug, warn};

use crate::transport::{self, Recv};

/// How long to keep listening after a complete response, for cases that
/// must not produce a second one
const LINGER: Duration = Duration::from_millis(500);

/// Connection and budget settings shared by every case of a run
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Total budget per case unless the case sets its own
    pub timeout: Duration,
    /// Longest single read
    pub idle_timeout: Duration,
    pub limits: FrameLimits,
}

impl Settings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
            idle_timeout: config.idle_timeout(),
            limits: config.frame_limits(),
        }
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What came back for one case
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: RawResponse,
    pub elapsed: Duration,
}

/// Send the case's bytes on a fresh connection and frame whatever comes back.
///
/// Never fails: an unreachable server becomes a `ConnectionRefused` response
/// and every other transport problem ends framing early.
pub fn execute(case: &TestCase, settings: &Settings) -> Exchange {
    let started = Instant::now();
    let budget = case.timeout().unwrap_or(settings.timeout);
    let deadline = started
        .checked_add(budget)
        .unwrap_or_else(|| started + MAX_TIMEOUT);

    let mut conn = match transport::connect(
        &settings.host,
        settings.port,
        settings.connect_timeout.min(budget),
    ) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(case = case.name(), error = %e, "connect failed");
            return Exchange {
                response: parse_framed(Framed::refused(e.to_string())),
                elapsed: started.elapsed(),
            };
        }
    };

    // The server may answer and close before reading everything (413, 400).
    // Its reply is still the thing under test.
    if let Err(e) = conn.send(case.request()) {
        warn!(case = case.name(), error = %e, "send incomplete, reading reply anyway");
    }

    let mut framer = Framer::new(settings.limits, case.is_head());
    read_until_framed(&mut conn, &mut framer, deadline, settings.idle_timeout, case.name());
    if case.expects_single_response() && framer.outcome().is_some_and(FramingOutcome::is_complete) {
        linger(&mut conn, &mut framer, deadline.min(Instant::now() + LINGER));
    }
    conn.close();

    let response = parse_framed(framer.into_framed());
    Exchange {
        response,
        elapsed: started.elapsed(),
    }
}

fn read_until_framed(
    conn: &mut transport::Connection,
    framer: &mut Framer,
    deadline: Instant,
    idle: Duration,
    name: &str,
) {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            framer.finish_timeout();
            return;
        }
        match conn.recv_chunk(framer.remaining_capacity(), idle.min(remaining)) {
            Ok(Recv::Data(bytes)) => {
                if framer.feed(&bytes) == Progress::Complete {
                    return;
                }
            }
            Ok(Recv::Eof) => {
                framer.finish_eof();
                return;
            }
            Ok(Recv::TimedOut) => {
                framer.finish_timeout();
                return;
            }
            Err(e) => {
                warn!(case = name, error = %e, "read failed, treating as close");
                framer.finish_eof();
                return;
            }
        }
    }
}

/// Collect trailing bytes after a complete response until the peer goes quiet.
fn linger(conn: &mut transport::Connection, framer: &mut Framer, until: Instant) {
    loop {
        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() || framer.remaining_capacity() == 0 {
            return;
        }
        match conn.recv_chunk(framer.remaining_capacity(), remaining) {
            Ok(Recv::Data(bytes)) => {
                framer.feed(&bytes);
            }
            Ok(Recv::Eof | Recv::TimedOut) | Err(_) => return,
        }
    }
}

/// Run one case to a ledger entry. Skipped cases never touch the network.
pub fn run_case(index: usize, case: &TestCase, settings: &Settings) -> LedgerEntry {
    if let Some(reason) = case.skip_reason() {
        debug!(index, case = case.name(), reason, "skipped");
        return LedgerEntry::new(index, case.clone(), MatchOutcome::skip(reason));
    }

    let exchange = execute(case, settings);
    let outcome = judge(case, &exchange.response);
    debug!(
        index,
        case = case.name(),
        verdict = %outcome.verdict,
        framing = %exchange.response.outcome,
        elapsed_ms = exchange.elapsed.as_millis() as u64,
        "{}",
        outcome.message
    );

    LedgerEntry::new(index, case.clone(), outcome)
        .with_diagnostics(Diagnostics::from_response(&exchange.response))
        .with_elapsed(exchange.elapsed)
}
