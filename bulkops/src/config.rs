//! Configuration for bulk operation defaults and the `bulkops` CLI.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. Sources are
//! merged in this order (later sources override earlier ones):
//!
//! 1. **YAML config file** - default `bulkops.yaml`, may be absent
//! 2. **Environment variables** - prefixed with `BULKOPS_`, nested keys split on `__`
//! 3. **DATABASE_URL** - overrides `destination_url` if set
//!
//! ```yaml
//! batch_size: 500
//! pseudo_table: physical
//! timeout: 30s
//! return_identity: true
//! source_url: postgres://localhost/source
//! destination_url: sqlite://target.db
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::options::{DEFAULT_BATCH_SIZE, PseudoTableType};

pub const DEFAULT_CONFIG_PATH: &str = "bulkops.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkConfig {
    /// Rows per statement
    pub batch_size: usize,
    /// Staging table kind for merge and update
    pub pseudo_table: PseudoTableType,
    /// Per-operation timeout, e.g. "30s" or "2m"
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Write generated identities back into source rows by default
    pub return_identity: bool,
    /// Database the CLI reads from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Database the CLI writes to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            pseudo_table: PseudoTableType::Temporary,
            timeout: None,
            return_identity: false,
            source_url: None,
            destination_url: None,
        }
    }
}

impl BulkConfig {
    #[allow(clippy::result_large_err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            // BULKOPS_CONFIG names the file itself and is not a setting
            .merge(Env::prefixed("BULKOPS_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "destination_url".into()))
    }
}
