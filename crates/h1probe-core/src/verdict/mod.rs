//! Verdict module - expectation matching and per-case judgement

mod judge;
mod outcome;

pub use judge::{evaluate, judge};
pub use outcome::{MatchOutcome, Verdict};
