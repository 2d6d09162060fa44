//! Durable write-ahead cache for spot batches the scraper could not insert
//! into the database.
//!
//! Invariants: a cache file exists iff its records are unacknowledged by
//! the database; creation is atomic (temp + fsync + rename), deletion only
//! follows a successful insert. The directory is safe against concurrent
//! readers of its own enumeration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use wsprnet_core::model::Spot;
use wsprnet_db::{Database, DbError};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt cache file {0}")]
    Corrupt(PathBuf),
}

/// A persisted record batch awaiting database insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: String,
    pub spot_count: usize,
    pub spots: Vec<Spot>,
}

pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Opens `dir` as the cache directory, falling back to a fixed temp
    /// location (and logging a warning) if `dir` isn't writable — records
    /// must never be dropped silently.
    pub fn open(dir: &Path) -> Self {
        if fs::create_dir_all(dir).is_err() || !is_writable(dir) {
            let fallback = std::env::temp_dir().join("wsprnet-cache");
            warn!(
                configured = %dir.display(),
                fallback = %fallback.display(),
                "cache directory not writable, redirecting to fallback location"
            );
            let _ = fs::create_dir_all(&fallback);
            return Self { dir: fallback };
        }
        Self { dir: dir.to_path_buf() }
    }

    fn corrupt_dir(&self) -> PathBuf {
        self.dir.join("corrupt")
    }

    /// Atomically writes `spots` as a new cache file, returning the
    /// filename (which doubles as a monotonic, chronologically-ordered
    /// cache id).
    pub fn write_batch(&self, spots: &[Spot]) -> Result<PathBuf, CacheError> {
        let now = Utc::now();
        let filename = format!(
            "spots_{}_{:06}.json",
            now.format("%Y%m%d_%H%M%S"),
            now.timestamp_subsec_micros()
        );
        let final_path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{filename}.tmp"));

        let entry = CacheEntry {
            timestamp: now.to_rfc3339(),
            spot_count: spots.len(),
            spots: spots.to_vec(),
        };

        let mut file = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
        let json = serde_json::to_vec(&entry).map_err(|e| CacheError::Io {
            path: tmp_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        file.write_all(&json).map_err(|e| io_err(&tmp_path, e))?;
        file.sync_all().map_err(|e| io_err(&tmp_path, e))?;
        fs::rename(&tmp_path, &final_path).map_err(|e| io_err(&final_path, e))?;

        info!(file = %final_path.display(), count = spots.len(), "wrote cache batch");
        Ok(final_path)
    }

    /// Enumerates cache files in filename (chronological) order and
    /// attempts to insert each one. Stops at the first transient failure to
    /// avoid head-of-line blocking; a later call resumes where this one
    /// left off.
    ///
    /// Returns `(succeeded, still_pending)` file counts.
    pub async fn replay_all(&self, db: &Database) -> Result<(usize, usize), CacheError> {
        let mut files = self.list_cache_files()?;
        files.sort();

        let mut succeeded = 0;
        for (index, path) in files.iter().enumerate() {
            let entry = match self.load_entry(path) {
                Ok(entry) => entry,
                Err(CacheError::Corrupt(path)) => {
                    self.quarantine_corrupt(&path);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match db.insert_batch("spots", &entry.spots).await {
                Ok(()) => {
                    fs::remove_file(path).map_err(|e| io_err(path, e))?;
                    succeeded += 1;
                    info!(file = %path.display(), "replayed cache batch");
                }
                Err(DbError::Transient(msg)) => {
                    warn!(file = %path.display(), error = %msg, "replay stopped at transient failure");
                    let pending = files.len() - index;
                    return Ok((succeeded, pending));
                }
                Err(DbError::Permanent(msg)) => {
                    error!(file = %path.display(), error = %msg, "permanent failure replaying cache batch");
                    return Err(CacheError::Io {
                        path: path.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::InvalidData, msg),
                    });
                }
            }
        }

        Ok((succeeded, 0))
    }

    fn list_cache_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("spots_"))
            {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn load_entry(&self, path: &Path) -> Result<CacheEntry, CacheError> {
        let content = fs::read(path).map_err(|e| io_err(path, e))?;
        serde_json::from_slice(&content).map_err(|_| CacheError::Corrupt(path.to_path_buf()))
    }

    fn quarantine_corrupt(&self, path: &Path) {
        let corrupt_dir = self.corrupt_dir();
        if fs::create_dir_all(&corrupt_dir).is_err() {
            error!(file = %path.display(), "failed to create corrupt cache dir");
            return;
        }
        if let Some(name) = path.file_name() {
            let dest = corrupt_dir.join(name);
            if let Err(e) = fs::rename(path, &dest) {
                error!(file = %path.display(), error = %e, "failed to quarantine corrupt cache file");
            } else {
                warn!(file = %dest.display(), "quarantined corrupt cache file");
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.list_cache_files().map(|f| f.len()).unwrap_or(0)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(".write-test");
    match fs::write(&probe, b"x") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_spot(id: u64) -> Spot {
        Spot {
            id,
            time: time::OffsetDateTime::now_utc(),
            band: 14,
            rx_sign: "K1ABC".into(),
            rx_lat: 42.5,
            rx_lon: -71.0,
            rx_loc: "FN42".into(),
            tx_sign: "W1XYZ".into(),
            tx_lat: 40.0,
            tx_lon: -75.0,
            tx_loc: "FN20".into(),
            distance: 100,
            azimuth: 90,
            rx_azimuth: 270,
            frequency: 14_097_100,
            power: 37,
            snr: -15,
            drift: 0,
            version: "2.1".into(),
            code: 1,
        }
    }

    #[test]
    fn write_batch_creates_file_with_filename_ordering() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path());
        let path1 = cache.write_batch(&[sample_spot(1)]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let path2 = cache.write_batch(&[sample_spot(2)]).unwrap();
        assert!(path1 < path2, "filenames must be chronologically ordered");
        assert_eq!(cache.pending_count(), 2);
    }

    #[test]
    fn no_tmp_files_left_after_write() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path());
        cache.write_batch(&[sample_spot(1)]).unwrap();
        let leftover_tmp = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"));
        assert!(!leftover_tmp);
    }

    #[test]
    fn corrupt_file_is_quarantined_on_replay_listing() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path());
        fs::write(dir.path().join("spots_20260101_000000_000000.json"), b"not json").unwrap();
        let entry = cache.load_entry(&dir.path().join("spots_20260101_000000_000000.json"));
        assert!(matches!(entry, Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn falls_back_when_dir_unwritable() {
        // A nonexistent path under a file (not a dir) can't be created -> fallback kicks in.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let unwritable = blocker.join("subdir");
        let cache = DiskCache::open(&unwritable);
        // Should not panic and should still accept writes via the fallback dir.
        let result = cache.write_batch(&[sample_spot(1)]);
        assert!(result.is_ok());
    }
}
