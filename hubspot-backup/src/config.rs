//! Configuration management for the backup run.
//!
//! Built-in defaults, overlaid by an optional TOML file, overlaid by
//! `HUBSPOT_BACKUP__<SECTION>__<KEY>` environment variables.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `HUBSPOT_BACKUP__BACKUP__PAGE_SIZE=100`.
const ENV_PREFIX: &str = "HUBSPOT_BACKUP";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub backup: BackupConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// HubSpot API root
    pub base_url: String,

    /// Per-request timeout in seconds (None = wait indefinitely)
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Root of the backup tree; a dated directory is created beneath it
    pub output_dir: PathBuf,

    /// `count` sent to every paginated endpoint except contacts
    pub page_size: u32,

    /// `count` sent to the contacts endpoint
    pub contacts_page_size: u32,

    /// Pause before each contacts continuation request
    pub contacts_delay_ms: u64,

    /// Register contacts continuations with the run's task tracker.
    /// `false` lets the run finish while the contacts chain is still in flight.
    pub track_contacts_continuations: bool,

    /// Upper bound on pages fetched per endpoint (None = until the API says stop)
    pub max_pages: Option<u32>,

    /// Look up the account before crawling; a failed lookup only logs a warning
    pub verify_account: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.hubapi.com".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("hubspot-backup"),
            page_size: 250,
            contacts_page_size: 100,
            contacts_delay_ms: 1000,
            track_contacts_continuations: true,
            max_pages: None,
            verify_account: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BackupConfig {
    pub fn contacts_delay(&self) -> Duration {
        Duration::from_millis(self.contacts_delay_ms)
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::new(
                &path.to_string_lossy(),
                ::config::FileFormat::Toml,
            ));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::BackupError::Config(e.to_string()))
    }
}
