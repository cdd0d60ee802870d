//! Match outcome - the verdict a single case ends with

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pass, fail, or skip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// Result of judging one case against the response it got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchOutcome {
    pub verdict: Verdict,
    /// Status code actually received, if one was parsed
    pub actual_status: Option<u16>,
    /// Human readable explanation
    pub message: String,
}

impl MatchOutcome {
    pub fn pass(actual_status: u16, message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            actual_status: Some(actual_status),
            message: message.into(),
        }
    }

    pub fn fail(actual_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail,
            actual_status,
            message: message.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Skip,
            actual_status: None,
            message: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(Verdict::Fail.to_string(), "FAIL");
        assert_eq!(Verdict::Skip.to_string(), "SKIP");
    }

    #[test]
    fn verdict_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Skip).unwrap(), "\"skip\"");
    }

    #[test]
    fn skip_has_no_status() {
        let outcome = MatchOutcome::skip("causes connection issues");
        assert_eq!(outcome.verdict, Verdict::Skip);
        assert_eq!(outcome.actual_status, None);
        assert_eq!(outcome.message, "causes connection issues");
    }
}
