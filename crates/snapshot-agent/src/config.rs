//! Snapshotter configuration
//!
//! Values come from an optional config file overlaid with `SNAPSHOT_*`
//! environment variables. Every field has a default.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "SNAPSHOT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/snapshot";

/// Where summary records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    /// Keep the most recent `memory_max_records` rows in process memory
    /// only. Nothing survives a restart, so this suits dry runs.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Port of the control/health/metrics server
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Base URL of the control-plane API
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    /// Row cap of the memory backend; the oldest rows are evicted first
    #[serde(default = "default_memory_max_records")]
    pub memory_max_records: usize,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    #[serde(default = "default_collection_jitter")]
    pub collection_jitter_ms: u64,

    /// Hours east of UTC applied to record timestamps
    #[serde(default = "default_record_offset")]
    pub record_utc_offset_hours: i32,

    /// Per-request deadline for control-plane calls; unset means none
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_control_plane_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_memory_max_records() -> usize {
    snapshot_lib::store::DEFAULT_MAX_RECORDS
}

fn default_database_path() -> PathBuf {
    PathBuf::from("kube-snapshot.db")
}

fn default_collection_interval() -> u64 {
    60
}

fn default_collection_jitter() -> u64 {
    1000
}

fn default_record_offset() -> i32 {
    snapshot_lib::DEFAULT_RECORD_OFFSET_HOURS
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            control_plane_url: default_control_plane_url(),
            store_backend: default_store_backend(),
            memory_max_records: default_memory_max_records(),
            database_path: default_database_path(),
            collection_interval_secs: default_collection_interval(),
            collection_jitter_ms: default_collection_jitter(),
            record_utc_offset_hours: default_record_offset(),
            request_timeout_secs: None,
        }
    }
}

impl SnapshotConfig {
    /// Load configuration from the config file (if present) and environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("SNAPSHOT"))
            .build()
            .context("Failed to read configuration")?;

        let config: SnapshotConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot produce a working snapshotter
    pub fn validate(&self) -> Result<()> {
        if self.collection_interval_secs == 0 {
            bail!("collection_interval_secs must be greater than zero");
        }
        if !(-23..=23).contains(&self.record_utc_offset_hours) {
            bail!(
                "record_utc_offset_hours must be within -23..=23, got {}",
                self.record_utc_offset_hours
            );
        }
        if self.memory_max_records == 0 {
            bail!("memory_max_records must be greater than zero");
        }

        let url = Url::parse(&self.control_plane_url)
            .with_context(|| format!("Invalid control_plane_url {}", self.control_plane_url))?;
        let loopback = match url.host() {
            Some(url::Host::Domain(domain)) => domain == "localhost",
            Some(url::Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback() || ip.is_unspecified(),
            None => false,
        };
        if loopback && url.port_or_known_default() == Some(self.api_port) {
            bail!(
                "control_plane_url {} points at this snapshotter's own api_port {}",
                self.control_plane_url,
                self.api_port
            );
        }
        Ok(())
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn collection_jitter(&self) -> Duration {
        Duration::from_millis(self.collection_jitter_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
