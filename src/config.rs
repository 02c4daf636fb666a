//! File and environment configuration.
//!
//! Configuration is read with the `config` crate from an optional file
//! (any format it understands, picked by extension) layered under
//! `SMRTLINK_DOCTOR_*` environment variables.
//!
//! ```toml
//! interval = "10s"
//! timeout_ms = 5000
//! max_failed_jobs = 15
//! summary_total = "legacy"
//! job_types = ["pbsmrtpipe", "merge-datasets"]
//!
//! [[systems]]
//! host = "smrtlink-alpha"
//! port = 8081
//!
//! [[systems]]
//! host = "smrtlink-beta"
//! port = 9091
//! interval = "30s"
//! job_types = ["pbsmrtpipe"]
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::coordinator::WatchedSystem;
use crate::data::duration::parse_duration;
use crate::data::TotalPolicy;
use crate::endpoint::RemoteEndpoint;

pub const DEFAULT_HOST: &str = "smrtlink-alpha";
pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_INTERVAL: &str = "60s";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_FAILED_JOBS: usize = 15;

/// Job types watched when none are configured.
pub const DEFAULT_JOB_TYPES: &[&str] = &[
    "pbsmrtpipe",
    "merge-datasets",
    "import-dataset",
    "convert-fasta-reference",
    "convert-fasta-barcodes",
];

const ENV_PREFIX: &str = "SMRTLINK_DOCTOR";

/// One `[[systems]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemConfig {
    pub host: String,
    pub port: u16,
    /// Overrides the top-level interval.
    pub interval: Option<String>,
    /// Overrides the top-level job types.
    pub job_types: Option<Vec<String>>,
}

impl SystemConfig {
    pub fn new(endpoint: &RemoteEndpoint) -> Self {
        Self {
            host: endpoint.host().to_string(),
            port: endpoint.port(),
            interval: None,
            job_types: None,
        }
    }
}

/// Command-line values layered over the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces the configured systems when non-empty.
    pub systems: Vec<RemoteEndpoint>,
    pub interval: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Replaces the configured job types when non-empty.
    pub job_types: Vec<String>,
    pub max_failed_jobs: Option<usize>,
    pub summary_total: Option<TotalPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub interval: String,
    pub timeout_ms: u64,
    pub max_failed_jobs: usize,
    pub summary_total: TotalPolicy,
    pub job_types: Vec<String>,
    pub systems: Vec<SystemConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_failed_jobs: DEFAULT_MAX_FAILED_JOBS,
            summary_total: TotalPolicy::default(),
            job_types: DEFAULT_JOB_TYPES.iter().map(|s| s.to_string()).collect(),
            systems: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from an optional file plus the environment.
    ///
    /// The result is not validated; see [`with_overrides`](Self::with_overrides).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Apply command-line overrides, then validate the result.
    ///
    /// Values replaced by an override are never validated, so a bad file
    /// value can be corrected from the command line.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if !overrides.systems.is_empty() {
            self.systems = overrides.systems.iter().map(SystemConfig::new).collect();
        }
        if let Some(interval) = &overrides.interval {
            self.interval = interval.clone();
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if !overrides.job_types.is_empty() {
            self.job_types = overrides.job_types.clone();
        }
        if let Some(max_failed_jobs) = overrides.max_failed_jobs {
            self.max_failed_jobs = max_failed_jobs;
        }
        if let Some(summary_total) = overrides.summary_total {
            self.summary_total = summary_total;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.interval()?;
        if self.timeout_ms == 0 {
            bail!("timeout_ms must be greater than zero");
        }
        for system in &self.systems {
            if system.host.trim().is_empty() {
                bail!("System host must not be empty");
            }
            if let Some(interval) = &system.interval {
                checked_interval(interval)
                    .with_context(|| format!("Invalid interval for {}:{}", system.host, system.port))?;
            }
        }
        Ok(())
    }

    /// Default poll interval.
    pub fn interval(&self) -> Result<Duration> {
        checked_interval(&self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve per-system overrides. Falls back to the default system when
    /// none is configured.
    pub fn to_watched_systems(&self) -> Result<Vec<WatchedSystem>> {
        let default_interval = self.interval()?;
        let defaults = [SystemConfig::new(&RemoteEndpoint::new(DEFAULT_HOST, DEFAULT_PORT))];
        let systems = if self.systems.is_empty() {
            &defaults[..]
        } else {
            &self.systems[..]
        };

        systems
            .iter()
            .map(|system| {
                let interval = match &system.interval {
                    Some(s) => checked_interval(s)?,
                    None => default_interval,
                };
                Ok(WatchedSystem {
                    endpoint: RemoteEndpoint::new(system.host.trim(), system.port),
                    interval,
                    job_types: system
                        .job_types
                        .clone()
                        .unwrap_or_else(|| self.job_types.clone()),
                })
            })
            .collect()
    }
}

fn checked_interval(s: &str) -> Result<Duration> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        bail!("Interval must be greater than zero: {}", s);
    }
    Ok(interval)
}
