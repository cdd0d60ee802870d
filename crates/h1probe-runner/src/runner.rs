//! Concurrent runner
//!
//! Cases go out to a fixed pool of scoped worker threads over a `crossbeam`
//! channel; entries come back over a second channel to the calling thread,
//! which is the only writer of the [`LedgerBuilder`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam::channel;
use thiserror::Error;
use tracing::{info, warn};

use h1probe_core::{
    Config, LedgerBuilder, LedgerEntry, LedgerError, MatchOutcome, ResultLedger, RunState,
    TestCase,
};

use crate::exchange::{Settings, run_case};
use crate::transport::{self, TransportError};

/// Reason recorded for cases a stopped run never started
pub const ABORTED_REASON: &str = "not run: run aborted";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot reach {target}: {source}")]
    Unreachable {
        target: String,
        source: TransportError,
    },
    #[error("no test cases to run")]
    NoCases,
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Shared stop flag. Once set, no new case starts.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a case list against one server
pub struct Runner {
    settings: Settings,
    concurrency: usize,
    stop: StopHandle,
}

impl Runner {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            settings: Settings::from_config(config),
            concurrency: config.concurrency.max(1),
            stop: StopHandle::new(),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// One plain TCP connect. Failing here is the only way a run fails as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Unreachable`] when the server cannot be connected to.
    pub fn preflight(&self) -> Result<(), RunError> {
        transport::connect(
            &self.settings.host,
            self.settings.port,
            self.settings.connect_timeout,
        )
        .map(transport::Connection::close)
        .map_err(|source| RunError::Unreachable {
            target: self.settings.target(),
            source,
        })
    }

    /// Run every case and return the frozen ledger.
    ///
    /// Per-case problems (refused, timeouts, garbage) become `Fail` entries.
    /// After a stop the ledger still lists every case. Cases never started are
    /// recorded as `Skip` and make the run state `Aborted`; a stop that lands
    /// after the last case started leaves the run `Completed`.
    ///
    /// # Errors
    ///
    /// Returns error if the case list is empty or the preflight connect fails.
    pub fn run(&self, cases: &[TestCase]) -> Result<ResultLedger, RunError> {
        if cases.is_empty() {
            return Err(RunError::NoCases);
        }
        self.preflight()?;

        let started = Instant::now();
        let workers = self.concurrency.min(cases.len());
        info!(
            server = %self.settings.target(),
            cases = cases.len(),
            workers,
            "starting run"
        );

        let mut ledger = LedgerBuilder::new(cases.len());
        ledger.start()?;

        let (job_tx, job_rx) = channel::unbounded::<usize>();
        for index in 0..cases.len() {
            if job_tx.send(index).is_err() {
                break;
            }
        }
        drop(job_tx);

        let (result_tx, result_rx) = channel::unbounded::<LedgerEntry>();
        thread::scope(|scope| -> Result<(), LedgerError> {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let settings = &self.settings;
                let stop = &self.stop;
                scope.spawn(move || {
                    for index in jobs.iter() {
                        if stop.is_stopped() {
                            break;
                        }
                        let entry = run_case(index, &cases[index], settings);
                        if results.send(entry).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for entry in result_rx.iter() {
                ledger.record(entry)?;
            }
            Ok(())
        })?;

        let missing: Vec<usize> = ledger.missing().collect();
        let state = if missing.is_empty() {
            RunState::Completed
        } else {
            warn!(not_run = missing.len(), "run stopped before every case started");
            RunState::Aborted
        };
        for index in missing {
            ledger.record(LedgerEntry::new(
                index,
                cases[index].clone(),
                MatchOutcome::skip(ABORTED_REASON),
            ))?;
        }

        let ledger = ledger.finish(state, started.elapsed())?;
        let totals = ledger.totals();
        info!(
            state = %ledger.state(),
            passed = totals.passed,
            failed = totals.failed,
            skipped = totals.skipped,
            elapsed_ms = ledger.duration().as_millis() as u64,
            "run finished"
        );
        Ok(ledger)
    }
}
