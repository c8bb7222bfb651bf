use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{Result, RollupError};
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "dns_rollup.json";

/// One search-service cluster to page through.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LookupConfig {
    pub program: String,
    pub args: Vec<String>,
    pub marker: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            program: "host".to_string(),
            args: vec!["-t".to_string(), "ptr".to_string()],
            marker: "pointer".to_string(),
        }
    }
}

/// Every field but `endpoints` may be omitted from the file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub endpoints: Vec<Endpoint>,
    #[serde(default = "defaults::index")]
    pub index: String,
    #[serde(default = "defaults::timestamp_field")]
    pub timestamp_field: String,
    #[serde(default = "defaults::fqdn_field")]
    pub fqdn_field: String,
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
    #[serde(default = "defaults::keep_alive")]
    pub keep_alive: String,
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "defaults::max_depth")]
    pub max_depth: usize,
    #[serde(default = "defaults::work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "defaults::reference_file")]
    pub reference_file: PathBuf,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub allow_partial: bool,
}

mod defaults {
    use std::path::PathBuf;

    pub fn index() -> String {
        "dns_queries-*".to_string()
    }

    pub fn timestamp_field() -> String {
        "@timestamp".to_string()
    }

    pub fn fqdn_field() -> String {
        "fqdn".to_string()
    }

    pub fn page_size() -> usize {
        10_000
    }

    pub fn keep_alive() -> String {
        "10m".to_string()
    }

    pub fn timeout_secs() -> u64 {
        100
    }

    pub fn max_depth() -> usize {
        crate::tree::DEFAULT_MAX_DEPTH
    }

    pub fn work_dir() -> PathBuf {
        PathBuf::from(".")
    }

    pub fn reference_file() -> PathBuf {
        PathBuf::from("file_to_match.csv")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            index: defaults::index(),
            timestamp_field: defaults::timestamp_field(),
            fqdn_field: defaults::fqdn_field(),
            page_size: defaults::page_size(),
            keep_alive: defaults::keep_alive(),
            timeout_secs: defaults::timeout_secs(),
            retry: RetryPolicy::default(),
            max_depth: defaults::max_depth(),
            work_dir: defaults::work_dir(),
            reference_file: defaults::reference_file(),
            lookup: LookupConfig::default(),
            allow_partial: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        info!(action = "load", component = "config", file_path = ?path, "Loading configuration");
        let content = fs::read_to_string(path).map_err(|e| RollupError::io(path, e))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| RollupError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(
            action = "loaded",
            component = "config",
            endpoint_count = config.endpoints.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(RollupError::Config("page_size must be greater than 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RollupError::Config(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(RollupError::Config("max_depth must be greater than 0".into()));
        }
        if self.lookup.marker.trim().is_empty() {
            return Err(RollupError::Config("lookup.marker must not be empty".into()));
        }
        if self.lookup.program.trim().is_empty() {
            return Err(RollupError::Config("lookup.program must not be empty".into()));
        }
        if self.endpoints.is_empty() {
            return Err(RollupError::Config("at least one endpoint is required".into()));
        }
        for endpoint in &self.endpoints {
            if endpoint.url.trim().is_empty() {
                return Err(RollupError::Config(format!(
                    "endpoint '{}' has an empty url",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reference file paths are taken relative to the work directory.
    pub fn reference_path(&self) -> PathBuf {
        self.work_dir.join(&self.reference_file)
    }
}
