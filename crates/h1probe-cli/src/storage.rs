//! Persisted run reports under `~/.h1probe/reports/`
//!
//! Every `h1probe run` is saved unless `--no-save` is given, whatever the
//! `--output` mode. Layout: `{host}_{port}_{timestamp}/` holding
//! `config.toml`, `summary.json`, `results.json` and, when anything failed,
//! `failures.json`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use h1probe_core::{Config, ResultLedger};

/// Everything a saved report is built from.
pub struct ReportData<'a> {
    pub config: &'a Config,
    pub ledger: &'a ResultLedger,
}

/// Write a report into a fresh directory under `base` and return its path.
pub fn save_report(data: &ReportData, base: &Path) -> io::Result<PathBuf> {
    let now = UtcTime::now();
    let report_dir = unique_dir(base, &dir_name(data.config, &now));
    std::fs::create_dir_all(&report_dir)?;

    let config_toml = toml::to_string_pretty(data.config).map_err(io::Error::other)?;
    std::fs::write(report_dir.join("config.toml"), config_toml)?;

    let ledger = data.ledger;
    let summary = serde_json::json!({
        "result": {
            "state": ledger.state(),
            "exit_code": ledger.exit_code(),
        },
        "totals": ledger.totals(),
        "categories": ledger.categories(),
        "meta": {
            "timestamp": now.iso(),
            "duration_secs": ledger.duration().as_secs_f64(),
            "target": data.config.target(),
            "suites": data.config.suites,
            "catalogs": data.config.catalogs,
        },
    });
    write_json(&report_dir.join("summary.json"), &summary)?;
    write_json(&report_dir.join("results.json"), ledger)?;

    let failures: Vec<_> = ledger.failures().collect();
    if !failures.is_empty() {
        write_json(&report_dir.join("failures.json"), &failures)?;
    }

    Ok(report_dir)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, text)
}

/// `localhost_8080_20261016T093000`
fn dir_name(config: &Config, now: &UtcTime) -> String {
    let host: String = config
        .host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{host}_{}_{}", config.port, now.compact())
}

/// Two runs started in the same second get `-2`, `-3`, ... suffixes.
fn unique_dir(base: &Path, name: &str) -> PathBuf {
    let first = base.join(name);
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| base.join(format!("{name}-{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Broken-down UTC wall clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UtcTime {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl UtcTime {
    fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::from_epoch_secs(secs)
    }

    fn from_epoch_secs(secs: u64) -> Self {
        let (year, month, day) = civil_from_days((secs / 86_400) as i64);
        let tod = secs % 86_400;
        Self {
            year,
            month,
            day,
            hour: (tod / 3600) as u32,
            minute: (tod % 3600 / 60) as u32,
            second: (tod % 60) as u32,
        }
    }

    /// Filesystem-safe form
    fn compact(&self) -> String {
        format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    fn iso(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
///
/// <https://howardhinnant.github.io/date_algorithms.html#civil_from_days>
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = i64::from(yoe) + era * 400 + i64::from(month <= 2);
    (year as i32, month, day)
}
