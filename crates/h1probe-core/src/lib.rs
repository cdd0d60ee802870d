//! h1probe-core: framing, parsing and verdict logic for raw HTTP/1.1 conformance testing
//!
//! Nothing in this crate opens a socket. The framer is fed byte slices, the
//! parser and matcher are pure functions, and the ledger is a plain value, so
//! every completion decision can be exercised with synthetic byte streams.

pub mod case;
pub mod catalog;
pub mod chunked;
pub mod config;
pub mod frame;
pub mod ledger;
pub mod parse;
pub mod verdict;

pub use case::{Expectation, MAX_TIMEOUT, RequestTemplate, TestCase};
pub use catalog::CatalogError;
pub use config::{Config, ConfigError};
pub use frame::{FrameLimits, Framed, Framer, FramingOutcome, Progress};
pub use ledger::{
    CategoryTally, Diagnostics, LedgerBuilder, LedgerEntry, LedgerError, ResultLedger, RunState,
    Totals, report_schema,
};
pub use parse::{HeaderLine, RawResponse, parse, parse_framed};
pub use verdict::{MatchOutcome, Verdict, evaluate, judge};
