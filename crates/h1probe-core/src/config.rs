//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::case::MAX_TIMEOUT;
use crate::frame::FrameLimits;

/// Harness configuration. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host of the server under test
    pub host: String,

    /// TCP port of the server under test
    pub port: u16,

    /// Total time budget per case in seconds
    pub timeout: f64,

    /// Longest wait for a single read in seconds (defaults to `timeout`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<f64>,

    /// TCP connect timeout in seconds
    pub connect_timeout: f64,

    /// Number of cases in flight at once
    pub concurrency: usize,

    /// Byte ceiling for one response
    pub max_response_bytes: usize,

    /// Byte ceiling for the status line plus headers
    pub max_header_bytes: usize,

    /// Extra catalog files (TOML, YAML or JSON)
    pub catalogs: Vec<PathBuf>,

    /// Built-in suites to run: "rfc", "smuggling", "status", "random"
    pub suites: Vec<String>,

    /// Seed for the "random" suite
    pub random_seed: u64,

    /// Number of cases the "random" suite generates
    pub random_count: usize,

    /// Where run reports are written (default: "~/.h1probe/reports")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            timeout: 5.0,
            idle_timeout: None,
            connect_timeout: 3.0,
            concurrency: 4,
            max_response_bytes: 4 * 1024 * 1024,
            max_header_bytes: 64 * 1024,
            catalogs: Vec::new(),
            suites: vec!["rfc".to_string()],
            random_seed: 0,
            random_count: 10,
            report_dir: None,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.h1probe.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load the first default config file found in `dir`, or defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        for name in Self::CANDIDATES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    pub const CANDIDATES: [&'static str; 3] = [".h1probe.toml", ".h1probe.json", "h1probe.toml"];

    /// Reject settings the runner cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        seconds("timeout", self.timeout)?;
        seconds("connect_timeout", self.connect_timeout)?;
        if let Some(idle) = self.idle_timeout {
            seconds("idle_timeout", idle)?;
        }
        if self.max_header_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_header_bytes must be non-zero".to_string(),
            ));
        }
        if self.max_header_bytes > self.max_response_bytes {
            return Err(ConfigError::Invalid(format!(
                "max_header_bytes ({}) exceeds max_response_bytes ({})",
                self.max_header_bytes, self.max_response_bytes
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        seconds("timeout", self.timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
            .and_then(|idle| seconds("idle_timeout", idle).ok())
            .unwrap_or_else(|| self.timeout())
    }

    pub fn connect_timeout(&self) -> Duration {
        seconds("connect_timeout", self.connect_timeout).unwrap_or(Duration::from_secs(3))
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_header_bytes: self.max_header_bytes,
            max_response_bytes: self.max_response_bytes,
        }
    }

    /// Report directory, with `~/.h1probe/reports` as fallback.
    pub fn report_dir(&self) -> PathBuf {
        if let Some(dir) = &self.report_dir {
            return dir.clone();
        }
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".h1probe")
            .join("reports")
    }

    /// `host:port` as dialed
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# h1probe configuration

# Server under test
host = "localhost"
port = 8080

# Per-case time budget in seconds, and the longest single read
timeout = 5.0
# idle_timeout = 2.0
connect_timeout = 3.0

# Cases in flight at once
concurrency = 4

# Byte ceilings for one response
max_response_bytes = 4194304
max_header_bytes = 65536

# Built-in suites: "rfc", "smuggling", "status", "random"
suites = ["rfc"]

# Extra catalog files (TOML, YAML or JSON)
# catalogs = ["cases/uploads.toml"]

# "random" suite: lowercase paths expected to be 404
# random_seed = 0
# random_count = 10

# Where run reports go (default: ~/.h1probe/reports)
# report_dir = ".h1probe/reports"
"#
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration, ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{key} must be positive, got {value}"
        )));
    }
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if duration <= MAX_TIMEOUT => Ok(duration),
        Ok(_) => Err(ConfigError::Invalid(format!(
            "{key} = {value} exceeds {} seconds",
            MAX_TIMEOUT.as_secs()
        ))),
        Err(e) => Err(ConfigError::Invalid(format!("{key} = {value}: {e}"))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
