//! Layered configuration for the three WSPR ingestion services.
//!
//! Priority, highest first (mirrors `otlp2parquet-config::sources`):
//! 1. Environment variables (`WSPRNET_<KEY>`, uppercased).
//! 2. A TOML config file (`--config` flag, or `WSPRNET_CONFIG` env var, or
//!    `./config.toml` / `./.wsprnet.toml` in that order).
//! 3. Built-in defaults.
//!
//! Keys are grouped into nested structs only where a service naturally
//! scopes its own (db, scraper, server, reflector, logging) — grouping is
//! an ergonomic convenience, every key still maps 1:1 to an env var row.

mod env_overrides;
mod file;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use env_overrides::apply_env_overrides;
pub use file::load_from_file;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reflector: ReflectorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    10_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            scraper: ScraperConfig::default(),
            server: ServerConfig::default(),
            reflector: ReflectorConfig::default(),
            logging: LoggingConfig::default(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    #[serde(default)]
    pub db_password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_host: "localhost".to_string(),
            db_port: 8123,
            db_user: "default".to_string(),
            db_password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub fetch_interval_secs: u64,
    pub cache_dir: PathBuf,
    pub session_file: PathBuf,
    pub session_ttl_secs: u64,
    pub upstream_username: String,
    #[serde(default)]
    pub upstream_password: String,
    #[serde(default = "default_replay_period")]
    pub replay_period: u32,
}

fn default_replay_period() -> u32 {
    5
}

impl ScraperConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 20,
            cache_dir: PathBuf::from("./cache"),
            session_file: PathBuf::from("./session.json"),
            session_ttl_secs: 3600,
            upstream_username: String::new(),
            upstream_password: String::new(),
            replay_period: default_replay_period(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub loop_interval_secs: u64,
    pub incoming_dirs: Vec<PathBuf>,
    pub extraction_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    2
}

impl ServerConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            loop_interval_secs: 10,
            incoming_dirs: vec![PathBuf::from("./incoming")],
            extraction_dir: PathBuf::from("./staging"),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectorConfig {
    pub loop_interval_secs: u64,
    pub incoming_glob: String,
    pub spool_base_dir: PathBuf,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    pub bandwidth_limit_kbps: u32,
    pub transfer_timeout_s: u64,
    pub retry_max: u32,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_transfer_interval")]
    pub transfer_interval_secs: u64,
}

fn default_scan_interval() -> u64 {
    10
}

fn default_transfer_interval() -> u64 {
    5
}

impl ReflectorConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn transfer_interval(&self) -> Duration {
        Duration::from_secs(self.transfer_interval_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_s)
    }
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            loop_interval_secs: 10,
            incoming_glob: "./incoming/*".to_string(),
            spool_base_dir: PathBuf::from("./spool"),
            destinations: Vec::new(),
            bandwidth_limit_kbps: 2_000,
            transfer_timeout_s: 120,
            retry_max: 5,
            scan_interval_secs: default_scan_interval(),
            transfer_interval_secs: default_transfer_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Destination {
    pub name: String,
    pub user: String,
    pub host: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbosity: u8,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_max_mb")]
    pub log_max_mb: u64,
}

fn default_log_max_mb() -> u64 {
    100
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: 1,
            log_file: None,
            log_max_mb: default_log_max_mb(),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from the file at `explicit_path` if given,
    /// otherwise from the default locations, layering environment variable
    /// overrides on top either way.
    pub fn load(explicit_path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut config = match explicit_path {
            Some(path) => load_from_file(Some(path))?.unwrap_or_default(),
            None => load_from_file(None)?.unwrap_or_default(),
        };
        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.batch_size, 10_000);
        assert_eq!(cfg.scraper.replay_period, 5);
        assert_eq!(cfg.reflector.retry_max, 5);
    }
}
