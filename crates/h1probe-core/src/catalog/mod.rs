//! Test case catalogs: files on disk and the built-in suites
//!
//! A catalog file holds a list of `[[cases]]`. Each case carries either the
//! literal request text (`raw`) or a structured `request` table that is
//! serialized with [`RequestTemplate::to_bytes`].
//!
//! ```toml
//! category = "Uploads"
//!
//! [[cases]]
//! name = "POST without body"
//! raw = "POST /uploads/ HTTP/1.1\r\nHost: localhost\r\n\r\n"
//! expected = 411
//! alternatives = [400]
//!
//! [[cases]]
//! name = "POST small body"
//! expected = 201
//!
//! [cases.request]
//! method = "POST"
//! path = "/uploads/"
//! headers = [["Host", "localhost"]]
//! body = "hi"
//! ```

mod builtin;
mod status;

pub use builtin::{BUILTIN_SUITES, builtin};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::case::{Expectation, MAX_TIMEOUT, RequestTemplate, TestCase};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Cannot parse {path} as {format}: {message}")]
    Parse {
        path: PathBuf,
        format: Format,
        message: String,
    },
    #[error("Case {name:?}: {reason}")]
    InvalidCase { name: String, reason: String },
    #[error("Unknown suite {0:?} (available: rfc, smuggling, status, random)")]
    UnknownSuite(String),
}

/// Catalog file encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toml => write!(f, "TOML"),
            Self::Yaml => write!(f, "YAML"),
            Self::Json => write!(f, "JSON"),
        }
    }
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Best guess from the content when the extension says nothing.
    fn sniff(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') {
            Self::Json
        } else if trimmed.starts_with("[[") || toml::from_str::<toml::Table>(content).is_ok() {
            Self::Toml
        } else {
            Self::Yaml
        }
    }
}

/// On-disk catalog layout
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    /// Category for cases that do not name their own
    #[serde(default)]
    pub category: Option<String>,
    pub cases: Vec<CaseDef>,
}

/// One case as written in a catalog file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDef {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Literal request text, sent byte for byte
    #[serde(default)]
    pub raw: Option<String>,
    /// Structured request
    #[serde(default)]
    pub request: Option<RequestTemplate>,
    pub expected: u16,
    #[serde(default)]
    pub alternatives: Vec<u16>,
    /// Seconds; falls back to the configured timeout
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub skip: Option<String>,
    #[serde(default)]
    pub body_contains: Vec<String>,
    #[serde(default)]
    pub body_excludes: Vec<String>,
    #[serde(default)]
    pub allow_malformed: bool,
    #[serde(default)]
    pub single_response: bool,
}

impl CaseDef {
    /// Build the immutable case. `category` applies when the entry names none.
    pub fn into_case(self, category: &str) -> Result<TestCase, CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidCase {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        let request = match (&self.raw, &self.request) {
            (Some(raw), None) => raw.clone().into_bytes(),
            (None, Some(template)) => template.to_bytes(),
            (Some(_), Some(_)) => return Err(invalid("has both `raw` and `request`")),
            (None, None) => return Err(invalid("needs `raw` or `request`")),
        };
        if request.is_empty() && self.skip.is_none() {
            return Err(invalid("request is empty"));
        }
        if !(100..=999).contains(&self.expected) {
            return Err(invalid("expected status must have three digits"));
        }
        let timeout = match self.timeout {
            Some(secs) if secs > 0.0 => {
                let timeout = Duration::try_from_secs_f64(secs)
                    .map_err(|e| invalid(&format!("timeout {secs}: {e}")))?;
                if timeout > MAX_TIMEOUT {
                    return Err(invalid(&format!(
                        "timeout {secs} exceeds {} seconds",
                        MAX_TIMEOUT.as_secs()
                    )));
                }
                Some(timeout)
            }
            Some(secs) => {
                return Err(invalid(&format!("timeout must be positive, got {secs}")));
            }
            None => None,
        };

        let category = self.category.as_deref().unwrap_or(category);
        let expectation = Expectation::exactly(self.expected).or(self.alternatives);
        let mut case = TestCase::raw(self.name, category, request, expectation);
        if let Some(timeout) = timeout {
            case = case.with_timeout(timeout);
        }
        if let Some(reason) = self.skip {
            case = case.skipped(reason);
        }
        for needle in self.body_contains {
            case = case.body_contains(needle);
        }
        for needle in self.body_excludes {
            case = case.body_excludes(needle);
        }
        if self.allow_malformed {
            case = case.allow_malformed();
        }
        if self.single_response {
            case = case.single_response();
        }
        Ok(case)
    }
}

/// Parse catalog text in a known format.
pub fn parse_catalog(
    content: &str,
    format: Format,
    path: &Path,
) -> Result<Vec<TestCase>, CatalogError> {
    let parse_err = |message: String| CatalogError::Parse {
        path: path.to_path_buf(),
        format,
        message,
    };
    let file: CatalogFile = match format {
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        Format::Yaml => serde_yml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
    };

    // File stem is the category of last resort.
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("catalog")
        .to_string();
    let category = file.category.unwrap_or(fallback);
    file.cases
        .into_iter()
        .map(|def| def.into_case(&category))
        .collect()
}

/// Load a catalog file; the format comes from the extension, or the content.
pub fn load(path: &Path) -> Result<Vec<TestCase>, CatalogError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CatalogError::Io(path.to_path_buf(), e.to_string()))?;
    let format = Format::from_path(path).unwrap_or_else(|| Format::sniff(&content));
    parse_catalog(&content, format, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CATALOG: &str = r#"
category = "Uploads"

[[cases]]
name = "POST without length"
raw = "POST /uploads/ HTTP/1.1\r\nHost: localhost\r\n\r\n"
expected = 411
alternatives = [400]
timeout = 2.0

[[cases]]
name = "structured upload"
category = "Structured"
request = { method = "POST", path = "/uploads/", headers = [["Host", "localhost"]], body = "hi" }
expected = 201
body_contains = ["created"]
"#;

    #[test]
    fn toml_catalog_builds_cases() {
        let cases = parse_catalog(TOML_CATALOG, Format::Toml, Path::new("x.toml")).unwrap();
        assert_eq!(cases.len(), 2);

        assert_eq!(cases[0].category(), "Uploads");
        assert_eq!(
            cases[0].request(),
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\n\r\n"
        );
        assert!(cases[0].expectation().accepts(400));
        assert_eq!(cases[0].timeout(), Some(Duration::from_secs(2)));

        assert_eq!(cases[1].category(), "Structured");
        assert_eq!(
            cases[1].request(),
            b"POST /uploads/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\nhi"
        );
        assert_eq!(cases[1].required_substrings(), ["created"]);
    }

    #[test]
    fn yaml_catalog_keeps_control_bytes() {
        let yaml = r#"
cases:
  - name: control byte in path
    raw: "GET /test\x01.html HTTP/1.1\r\nHost: localhost\r\n\r\n"
    expected: 400
    alternatives: [404]
    single_response: true
"#;
        let cases = parse_catalog(yaml, Format::Yaml, Path::new("control.yaml")).unwrap();
        assert_eq!(cases[0].category(), "control");
        assert!(cases[0].request().contains(&1));
        assert!(cases[0].expects_single_response());
    }

    #[test]
    fn json_catalog_with_skip() {
        let json = r#"{"cases": [
            {"name": "hangs", "raw": "GET / HTTP/1.1\r\n", "expected": 400, "skip": "waits forever"}
        ]}"#;
        let cases = parse_catalog(json, Format::Json, Path::new("c.json")).unwrap();
        assert_eq!(cases[0].skip_reason(), Some("waits forever"));
    }

    #[test]
    fn case_needs_exactly_one_request_form() {
        let both = r#"
[[cases]]
name = "both"
raw = "GET / HTTP/1.1\r\n\r\n"
request = { path = "/" }
expected = 200
"#;
        let err = parse_catalog(both, Format::Toml, Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCase { ref name, .. } if name == "both"));

        let neither = "[[cases]]\nname = \"neither\"\nexpected = 200\n";
        assert!(parse_catalog(neither, Format::Toml, Path::new("x.toml")).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let typo = "[[cases]]\nname = \"t\"\nraw = \"GET / HTTP/1.1\\r\\n\\r\\n\"\nexpect = 200\n";
        assert!(matches!(
            parse_catalog(typo, Format::Toml, Path::new("x.toml")),
            Err(CatalogError::Parse { .. })
        ));
    }

    fn with_timeout(timeout: &str) -> Result<Vec<TestCase>, CatalogError> {
        let text = format!(
            "[[cases]]\nname = \"t\"\nraw = \"GET / HTTP/1.1\\r\\n\\r\\n\"\n\
             expected = 200\ntimeout = {timeout}\n"
        );
        parse_catalog(&text, Format::Toml, Path::new("x.toml"))
    }

    #[test]
    fn bad_timeout_is_rejected() {
        assert!(matches!(
            with_timeout("0.0"),
            Err(CatalogError::InvalidCase { .. })
        ));
    }

    #[test]
    fn timeout_above_ceiling_is_rejected() {
        for timeout in ["1.8e19", "86401.0"] {
            assert!(
                matches!(with_timeout(timeout), Err(CatalogError::InvalidCase { .. })),
                "{timeout}"
            );
        }
        let cases = with_timeout("2.5").unwrap();
        assert_eq!(cases[0].timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn load_sniffs_format_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases");
        std::fs::write(&path, TOML_CATALOG).unwrap();
        assert_eq!(load(&path).unwrap().len(), 2);

        let json_path = dir.path().join("more");
        std::fs::write(
            &json_path,
            r#"{"cases": [{"name": "a", "raw": "GET / HTTP/1.1\r\n\r\n", "expected": 200}]}"#,
        )
        .unwrap();
        assert_eq!(load(&json_path).unwrap().len(), 1);
    }

    #[test]
    fn load_missing_file() {
        let err = load(Path::new("/nonexistent/catalog.toml")).unwrap_err();
        assert!(matches!(err, CatalogError::Io(..)));
    }
}
