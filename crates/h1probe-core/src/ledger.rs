//! Result ledger: one entry per submitted case, tallied by category
//!
//! A run owns exactly one [`LedgerBuilder`]. It is the only writer; workers
//! hand their outcomes to whoever holds it. Once the run ends the builder is
//! consumed by [`LedgerBuilder::finish`], which refuses to produce a ledger
//! that is missing a case, and the resulting [`ResultLedger`] is read-only.

use std::collections::BTreeMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::case::TestCase;
use crate::frame::FramingOutcome;
use crate::parse::RawResponse;
use crate::verdict::{MatchOutcome, Verdict};

/// Longest response prefix kept for diagnostics
const PREVIEW_BYTES: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("run already {0}")]
    AlreadyStarted(RunState),
    #[error("ledger is {0}, not running")]
    NotRunning(RunState),
    #[error("case #{index} was never submitted ({submitted} cases in this run)")]
    UnknownCase { index: usize, submitted: usize },
    #[error("case #{0} was already recorded")]
    DuplicateEntry(usize),
    #[error("{missing} of {submitted} cases have no outcome")]
    Incomplete { missing: usize, submitted: usize },
    #[error("{0} is not a terminal run state")]
    NotTerminal(RunState),
}

/// Lifecycle of a run: `Idle → Running → Completed | Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Pass/fail/skip counts for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryTally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl CategoryTally {
    fn count(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::Fail => self.failed += 1,
            Verdict::Skip => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Share of executed (non-skipped) cases that passed, as a percentage.
    pub fn pass_rate(&self) -> f64 {
        let executed = self.passed + self.failed;
        if executed == 0 {
            0.0
        } else {
            self.passed as f64 / executed as f64 * 100.0
        }
    }
}

/// Whole-run counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Totals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// What the connection actually produced, kept for failing-case triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostics {
    pub framing: FramingOutcome,
    pub status_line: String,
    pub truncated: bool,
    pub bytes_received: usize,
    /// Bytes after the logical end of the response
    pub unconsumed_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Lossy text of the first bytes received
    pub preview: String,
}

impl Diagnostics {
    pub fn from_response(response: &RawResponse) -> Self {
        let preview_end = response.raw.len().min(PREVIEW_BYTES);
        Self {
            framing: response.outcome,
            status_line: response.status_line.clone(),
            truncated: response.truncated,
            bytes_received: response.bytes_received(),
            unconsumed_bytes: response.unconsumed().len(),
            detail: response.detail.clone(),
            preview: String::from_utf8_lossy(&response.raw[..preview_end]).into_owned(),
        }
    }
}

/// One case and the outcome it ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct LedgerEntry {
    /// Position in the submitted case list
    pub index: usize,
    pub case: TestCase,
    pub outcome: MatchOutcome,
    /// Absent for cases that never touched the network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
    pub elapsed_ms: u64,
}

impl LedgerEntry {
    pub fn new(index: usize, case: TestCase, outcome: MatchOutcome) -> Self {
        Self {
            index,
            case,
            outcome,
            diagnostics: None,
            elapsed_ms: 0,
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn verdict(&self) -> Verdict {
        self.outcome.verdict
    }
}

/// Single-writer accumulator for a run in progress.
#[derive(Debug)]
pub struct LedgerBuilder {
    state: RunState,
    slots: Vec<Option<LedgerEntry>>,
    categories: BTreeMap<String, CategoryTally>,
    recorded: usize,
}

impl LedgerBuilder {
    /// Ledger for `submitted` cases, indexed `0..submitted`.
    pub fn new(submitted: usize) -> Self {
        Self {
            state: RunState::Idle,
            slots: std::iter::repeat_with(|| None).take(submitted).collect(),
            categories: BTreeMap::new(),
            recorded: 0,
        }
    }

    pub fn start(&mut self) -> Result<(), LedgerError> {
        if self.state != RunState::Idle {
            return Err(LedgerError::AlreadyStarted(self.state));
        }
        self.state = RunState::Running;
        Ok(())
    }

    /// Append one outcome and bump its category tally.
    pub fn record(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        if self.state != RunState::Running {
            return Err(LedgerError::NotRunning(self.state));
        }
        let submitted = self.slots.len();
        let index = entry.index;
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(LedgerError::UnknownCase { index, submitted })?;
        if slot.is_some() {
            return Err(LedgerError::DuplicateEntry(index));
        }

        self.categories
            .entry(entry.case.category().to_string())
            .or_default()
            .count(entry.verdict());
        *slot = Some(entry);
        self.recorded += 1;
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn submitted(&self) -> usize {
        self.slots.len()
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn is_recorded(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Option::is_some)
    }

    /// Indices that have no outcome yet.
    pub fn missing(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index)
    }

    /// Freeze the run. Every submitted case must have exactly one entry,
    /// whichever terminal state the run ended in.
    pub fn finish(self, state: RunState, duration: Duration) -> Result<ResultLedger, LedgerError> {
        if !state.is_terminal() {
            return Err(LedgerError::NotTerminal(state));
        }
        if self.state != RunState::Running {
            return Err(LedgerError::NotRunning(self.state));
        }
        let submitted = self.slots.len();
        if self.recorded != submitted {
            return Err(LedgerError::Incomplete {
                missing: submitted - self.recorded,
                submitted,
            });
        }

        // Slots are indexed by submission order, so this is already sorted.
        let entries: Vec<LedgerEntry> = self.slots.into_iter().flatten().collect();
        let totals = self
            .categories
            .values()
            .fold(Totals::default(), |mut totals, tally| {
                totals.total += tally.total();
                totals.passed += tally.passed;
                totals.failed += tally.failed;
                totals.skipped += tally.skipped;
                totals
            });

        Ok(ResultLedger {
            state,
            totals,
            categories: self.categories,
            entries,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

/// Frozen outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ResultLedger {
    state: RunState,
    totals: Totals,
    categories: BTreeMap<String, CategoryTally>,
    entries: Vec<LedgerEntry>,
    duration_ms: u64,
}

impl ResultLedger {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn categories(&self) -> &BTreeMap<String, CategoryTally> {
        &self.categories
    }

    /// Entries in submission order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn failures(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.verdict() == Verdict::Fail)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// 0 when everything passed, 1 on any failure, 2 when the run was aborted.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            RunState::Aborted => 2,
            _ if self.totals.failed > 0 => 1,
            _ => 0,
        }
    }
}

/// JSON Schema of the serialized [`ResultLedger`].
pub fn report_schema() -> schemars::Schema {
    schemars::schema_for!(ResultLedger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Expectation;
    use crate::parse::parse;

    fn case(category: &str) -> TestCase {
        TestCase::raw("c", category, "GET / HTTP/1.1\r\n\r\n", Expectation::exactly(200))
    }

    fn entry(index: usize, category: &str, outcome: MatchOutcome) -> LedgerEntry {
        LedgerEntry::new(index, case(category), outcome)
    }

    fn running(submitted: usize) -> LedgerBuilder {
        let mut builder = LedgerBuilder::new(submitted);
        builder.start().unwrap();
        builder
    }

    #[test]
    fn record_requires_running() {
        let mut builder = LedgerBuilder::new(1);
        let err = builder
            .record(entry(0, "a", MatchOutcome::pass(200, "ok")))
            .unwrap_err();
        assert_eq!(err, LedgerError::NotRunning(RunState::Idle));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut builder = running(1);
        assert_eq!(
            builder.start(),
            Err(LedgerError::AlreadyStarted(RunState::Running))
        );
    }

    #[test]
    fn duplicate_and_unknown_entries_are_rejected() {
        let mut builder = running(2);
        builder.record(entry(1, "a", MatchOutcome::pass(200, "ok"))).unwrap();
        assert_eq!(
            builder.record(entry(1, "a", MatchOutcome::pass(200, "ok"))),
            Err(LedgerError::DuplicateEntry(1))
        );
        assert_eq!(
            builder.record(entry(5, "a", MatchOutcome::pass(200, "ok"))),
            Err(LedgerError::UnknownCase {
                index: 5,
                submitted: 2
            })
        );
        assert_eq!(builder.recorded(), 1);
        assert!(builder.is_recorded(1));
        assert!(!builder.is_recorded(0));
        assert_eq!(builder.missing().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn finish_rejects_missing_cases() {
        let mut builder = running(3);
        builder.record(entry(0, "a", MatchOutcome::pass(200, "ok"))).unwrap();
        let err = builder
            .finish(RunState::Completed, Duration::ZERO)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Incomplete {
                missing: 2,
                submitted: 3
            }
        );
    }

    #[test]
    fn finish_rejects_non_terminal_state() {
        let builder = running(0);
        assert_eq!(
            builder.finish(RunState::Running, Duration::ZERO).unwrap_err(),
            LedgerError::NotTerminal(RunState::Running)
        );
    }

    #[test]
    fn entries_come_out_in_submission_order() {
        let mut builder = running(3);
        builder.record(entry(2, "b", MatchOutcome::skip("later"))).unwrap();
        builder.record(entry(0, "a", MatchOutcome::pass(200, "ok"))).unwrap();
        builder
            .record(entry(1, "a", MatchOutcome::fail(Some(404), "expected 200, got 404")))
            .unwrap();

        let ledger = builder
            .finish(RunState::Completed, Duration::from_millis(1500))
            .unwrap();
        let order: Vec<usize> = ledger.entries().iter().map(|e| e.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(
            ledger.totals(),
            Totals {
                total: 3,
                passed: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(
            ledger.categories()["a"],
            CategoryTally {
                passed: 1,
                failed: 1,
                skipped: 0
            }
        );
        assert_eq!(ledger.categories()["b"].skipped, 1);
        assert_eq!(ledger.failures().count(), 1);
        assert_eq!(ledger.duration(), Duration::from_millis(1500));
        assert_eq!(ledger.exit_code(), 1);
    }

    #[test]
    fn aborted_run_exit_code() {
        let mut builder = running(1);
        builder
            .record(entry(0, "a", MatchOutcome::skip("not run: run aborted")))
            .unwrap();
        let ledger = builder.finish(RunState::Aborted, Duration::ZERO).unwrap();
        assert_eq!(ledger.state(), RunState::Aborted);
        assert_eq!(ledger.exit_code(), 2);
    }

    #[test]
    fn pass_rate_ignores_skips() {
        let tally = CategoryTally {
            passed: 3,
            failed: 1,
            skipped: 10,
        };
        assert!((tally.pass_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CategoryTally::default().pass_rate(), 0.0);
    }

    #[test]
    fn diagnostics_capture_response_shape() {
        let response = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokEXTRA");
        let diagnostics = Diagnostics::from_response(&response);
        assert_eq!(diagnostics.framing, FramingOutcome::CompleteByLength);
        assert_eq!(diagnostics.status_line, "HTTP/1.1 200 OK");
        assert_eq!(diagnostics.unconsumed_bytes, 5);
        assert!(diagnostics.preview.starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn ledger_serializes_state_and_totals() {
        let mut builder = running(1);
        builder.record(entry(0, "a", MatchOutcome::pass(200, "got 200"))).unwrap();
        let ledger = builder.finish(RunState::Completed, Duration::ZERO).unwrap();
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["totals"]["passed"], 1);
        assert_eq!(json["entries"][0]["outcome"]["verdict"], "pass");
        assert!(json["entries"][0].get("diagnostics").is_none());
    }
}
