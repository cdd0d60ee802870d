//! Terminal rendering of a finished run

use std::fmt::Write;

use h1probe_core::{ResultLedger, RunState, TestCase};

const NAME_WIDTH: usize = 28;

/// Failures, per-category table, totals and the final line.
pub fn summary(ledger: &ResultLedger, target: &str) -> String {
    let mut out = String::new();
    let failures: Vec<_> = ledger.failures().collect();

    if !failures.is_empty() {
        let _ = writeln!(out, "Failures ({}):", failures.len());
        for entry in failures {
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                entry.case.category(),
                entry.case.name(),
                entry.outcome.message
            );
            if let Some(diag) = &entry.diagnostics {
                let _ = writeln!(
                    out,
                    "      framing: {}, {} bytes received",
                    diag.framing, diag.bytes_received
                );
            }
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "{:<NAME_WIDTH$}{:>6}{:>6}{:>6}{:>8}",
        "Category", "Pass", "Fail", "Skip", "Rate"
    );
    for (category, tally) in ledger.categories() {
        let _ = writeln!(
            out,
            "{:<NAME_WIDTH$}{:>6}{:>6}{:>6}{:>8}",
            category,
            tally.passed,
            tally.failed,
            tally.skipped,
            format!("{:.1}%", tally.pass_rate())
        );
    }
    out.push('\n');

    let totals = ledger.totals();
    let _ = writeln!(
        out,
        "Target: {target} | Total: {} | Passed: {} | Failed: {} | Skipped: {}",
        totals.total, totals.passed, totals.failed, totals.skipped
    );
    let _ = writeln!(out, "Duration: {:.2}s", ledger.duration().as_secs_f64());

    let verdict = match ledger.state() {
        RunState::Aborted => "ABORTED",
        _ if totals.failed > 0 => "FAIL",
        _ => "PASS",
    };
    let _ = write!(out, "Result: {verdict} (exit code {})", ledger.exit_code());
    out
}

/// Case listing for `run --dry-run`.
pub fn case_list(cases: &[TestCase]) -> String {
    let mut out = String::new();
    for (index, case) in cases.iter().enumerate() {
        let _ = write!(
            out,
            "#{index} [{}] {} -> {}",
            case.category(),
            case.name(),
            case.expectation()
        );
        if let Some(reason) = case.skip_reason() {
            let _ = write!(out, " (skip: {reason})");
        }
        out.push('\n');
    }
    let _ = write!(out, "{} cases", cases.len());
    out
}
