//! Environment variable overrides, highest priority in the config layering.
//! Every key is read as `WSPRNET_<KEY>`.

use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;

const PREFIX: &str = "WSPRNET_";

pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<()> {
    if let Some(v) = get_string("DB_HOST")? {
        config.db.db_host = v;
    }
    if let Some(v) = get_parsed::<u16>("DB_PORT")? {
        config.db.db_port = v;
    }
    if let Some(v) = get_string("DB_USER")? {
        config.db.db_user = v;
    }
    if let Some(v) = get_string("DB_PASSWORD")? {
        config.db.db_password = v;
    }

    if let Some(v) = get_parsed::<u64>("FETCH_INTERVAL")? {
        config.scraper.fetch_interval_secs = v;
    }
    if let Some(v) = get_string("CACHE_DIR")? {
        config.scraper.cache_dir = v.into();
    }
    if let Some(v) = get_string("SESSION_FILE")? {
        config.scraper.session_file = v.into();
    }
    if let Some(v) = get_parsed::<u64>("SESSION_TTL")? {
        config.scraper.session_ttl_secs = v;
    }
    if let Some(v) = get_string("UPSTREAM_USERNAME")? {
        config.scraper.upstream_username = v;
    }
    if let Some(v) = get_string("UPSTREAM_PASSWORD")? {
        config.scraper.upstream_password = v;
    }

    if let Some(v) = get_parsed::<u64>("LOOP_INTERVAL")? {
        config.server.loop_interval_secs = v;
        config.reflector.loop_interval_secs = v;
    }
    if let Some(v) = get_string("INCOMING_DIRS")? {
        config.server.incoming_dirs = v.split(',').map(|s| s.trim().into()).collect();
    }
    if let Some(v) = get_string("EXTRACTION_DIR")? {
        config.server.extraction_dir = v.into();
    }

    if let Some(v) = get_parsed::<u32>("BANDWIDTH_LIMIT_KBPS")? {
        config.reflector.bandwidth_limit_kbps = v;
    }
    if let Some(v) = get_parsed::<u64>("TRANSFER_TIMEOUT_S")? {
        config.reflector.transfer_timeout_s = v;
    }
    if let Some(v) = get_parsed::<u32>("RETRY_MAX")? {
        config.reflector.retry_max = v;
    }

    if let Some(v) = get_parsed::<u8>("VERBOSITY")? {
        config.logging.verbosity = v;
    }
    if let Some(v) = get_string("LOG_FILE")? {
        config.logging.log_file = Some(v.into());
    }
    if let Some(v) = get_parsed::<u64>("LOG_MAX_MB")? {
        config.logging.log_max_mb = v;
    }

    if let Some(v) = get_parsed::<usize>("BATCH_SIZE")? {
        config.batch_size = v;
    }

    Ok(())
}

fn get_string(key: &str) -> Result<Option<String>> {
    let full_key = format!("{PREFIX}{key}");
    match env::var(&full_key) {
        Ok(v) if !v.is_empty() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read env var {full_key}")),
    }
}

fn get_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    let full_key = format!("{PREFIX}{key}");
    match get_string(key)? {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{full_key} has an invalid value: {v:?}")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn overrides_db_host_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("WSPRNET_DB_HOST", "ch.internal");
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config).unwrap();
        assert_eq!(config.db.db_host, "ch.internal");
        env::remove_var("WSPRNET_DB_HOST");
    }

    #[test]
    fn rejects_invalid_numeric_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("WSPRNET_DB_PORT", "not-a-number");
        let mut config = RuntimeConfig::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(err.to_string().contains("WSPRNET_DB_PORT"));
        env::remove_var("WSPRNET_DB_PORT");
    }
}
