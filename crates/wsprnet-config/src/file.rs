//! Config file discovery and parsing.

use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_LOCATIONS: &[&str] = &["./config.toml", "./.wsprnet.toml"];

/// Loads a TOML config from `explicit_path`, or `WSPRNET_CONFIG`, or the
/// first of [`DEFAULT_LOCATIONS`] that exists. Returns `Ok(None)` when
/// nothing was found, letting the caller fall back to [`RuntimeConfig::default`].
pub fn load_from_file(explicit_path: Option<&Path>) -> Result<Option<RuntimeConfig>> {
    if let Some(path) = explicit_path {
        return Ok(Some(parse_file(path)?));
    }

    if let Ok(path) = env::var("WSPRNET_CONFIG") {
        return Ok(Some(parse_file(Path::new(&path))?));
    }

    for candidate in DEFAULT_LOCATIONS {
        let path = Path::new(candidate);
        if path.exists() {
            return Ok(Some(parse_file(path)?));
        }
    }

    Ok(None)
}

fn parse_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            batch_size = 5000

            [db]
            db_host = "ch.example.com"
            db_port = 8123
            db_user = "ingest"

            [scraper]
            fetch_interval_secs = 30
            cache_dir = "/var/cache/wspr"
            session_file = "/var/lib/wspr/session.json"
            session_ttl_secs = 1800
            upstream_username = "bob"
            "#
        )
        .unwrap();

        let loaded = load_from_file(Some(file.path())).unwrap().unwrap();
        assert_eq!(loaded.batch_size, 5000);
        assert_eq!(loaded.db.db_host, "ch.example.com");
        assert_eq!(loaded.scraper.fetch_interval_secs, 30);
    }

    #[test]
    fn nonexistent_explicit_path_errors() {
        let err = parse_file(Path::new("/no/such/wsprnet-config.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
