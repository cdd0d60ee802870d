//! Assemble the case list a config asks for

use h1probe_core::catalog::{self, CatalogError};
use h1probe_core::{Config, TestCase};

use crate::generate::random_paths;

/// Built-in suites in config order, then every catalog file.
pub fn cases_from_config(config: &Config) -> Result<Vec<TestCase>, CatalogError> {
    let mut cases = Vec::new();
    for suite in &config.suites {
        match suite.as_str() {
            "random" => cases.extend(random_paths(config.random_seed, config.random_count)),
            name => cases.extend(catalog::builtin(name)?),
        }
    }
    for path in &config.catalogs {
        cases.extend(catalog::load(path)?);
    }
    Ok(cases)
}
