//! Persisted session state.

use chrono::{DateTime, Utc};
use cookie_store::CookieStore;
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub cookies: serde_json::Value,
    pub saved_at: i64,
    pub user_agent: String,
    #[serde(default)]
    pub highest_seen_spot_id: u64,
}

impl PersistedSession {
    pub fn is_fresh(&self, ttl_secs: u64) -> bool {
        let saved_at = DateTime::<Utc>::from_timestamp(self.saved_at, 0).unwrap_or(Utc::now());
        let age = Utc::now().signed_duration_since(saved_at);
        age.num_seconds() >= 0 && (age.num_seconds() as u64) < ttl_secs
    }

    pub fn load(path: &Path) -> std::io::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(session) => Ok(Some(session)),
            Err(_) => Ok(None), // corrupt/unparseable -> treat as absent, force re-login
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        let content = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)
    }

    pub fn from_cookie_store(
        store: &CookieStore,
        user_agent: &str,
        highest_seen_spot_id: u64,
    ) -> serde_json::Result<Self> {
        let mut buf = Vec::new();
        store
            .save_json(&mut buf)
            .map_err(|_| serde::de::Error::custom("failed to serialize cookie store"))?;
        Ok(Self {
            cookies: serde_json::from_slice(&buf)?,
            saved_at: Utc::now().timestamp(),
            user_agent: user_agent.to_string(),
            highest_seen_spot_id,
        })
    }

    pub fn to_cookie_store(&self) -> Option<CookieStore> {
        let raw = serde_json::to_vec(&self.cookies).ok()?;
        CookieStore::load_json(&raw[..]).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_respects_ttl() {
        let session = PersistedSession {
            cookies: serde_json::json!({}),
            saved_at: Utc::now().timestamp(),
            user_agent: "wsprnet-scraper/0.1".to_string(),
            highest_seen_spot_id: 0,
        };
        assert!(session.is_fresh(3600));

        let stale = PersistedSession {
            saved_at: Utc::now().timestamp() - 7200,
            ..session
        };
        assert!(!stale.is_fresh(3600));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = PersistedSession {
            cookies: serde_json::json!({"a": "b"}),
            saved_at: 1_700_000_000,
            user_agent: "ua".to_string(),
            highest_seen_spot_id: 42,
        };
        session.save(&path).unwrap();
        let loaded = PersistedSession::load(&path).unwrap().unwrap();
        assert_eq!(loaded.saved_at, 1_700_000_000);
        assert_eq!(loaded.user_agent, "ua");
        assert_eq!(loaded.highest_seen_spot_id, 42);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");
        assert!(PersistedSession::load(&path).unwrap().is_none());
    }
}
