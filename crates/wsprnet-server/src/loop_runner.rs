//! Spool scan loop: enumerate incoming archives, claim and ingest each with
//! a bounded pool of concurrent workers, quarantining archives that fail
//! extraction repeatedly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use wsprnet_core::error::{Classified, Severity};
use wsprnet_db::Database;

use crate::claim::{claim, is_archive};
use crate::error::ArchiveError;
use crate::ingest::ingest_archive;

/// An archive that has failed extraction this many times is moved to
/// `failed/` under the extraction directory instead of being retried again.
const MAX_EXTRACT_ATTEMPTS: u32 = 3;

pub struct ServerLoop {
    incoming_dirs: Vec<PathBuf>,
    extraction_dir: PathBuf,
    db: Arc<Database>,
    workers: usize,
    loop_interval: std::time::Duration,
}

impl ServerLoop {
    pub fn new(
        incoming_dirs: Vec<PathBuf>,
        extraction_dir: PathBuf,
        db: Database,
        workers: usize,
        loop_interval: std::time::Duration,
    ) -> Self {
        Self {
            incoming_dirs,
            extraction_dir,
            db: Arc::new(db),
            workers: workers.max(1),
            loop_interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.extraction_dir)?;
        std::fs::create_dir_all(self.extraction_dir.join("failed"))?;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.scan_and_ingest().await {
                error!(error = %e, "scan pass failed");
            }

            tokio::select! {
                _ = sleep(self.loop_interval) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("server loop exiting");
        Ok(())
    }

    async fn scan_and_ingest(&self) -> anyhow::Result<()> {
        let mut candidates = Vec::new();
        for dir in &self.incoming_dirs {
            candidates.extend(list_archives(dir)?);
        }
        // Files already claimed into extraction_dir that failed a prior
        // attempt live here under their `.attemptN` suffix; they must be
        // rescanned too, or quarantine_or_retry's retry half never fires.
        candidates.extend(list_retry_candidates(&self.extraction_dir)?);

        if candidates.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(candidates.len());

        for path in candidates {
            let permit = semaphore.clone().acquire_owned().await?;
            let db = self.db.clone();
            let extraction_dir = self.extraction_dir.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                process_one(&path, &extraction_dir, &db).await
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await? {
                warn!(error = %e, "archive processing failed");
            }
        }

        Ok(())
    }
}

async fn process_one(path: &Path, extraction_dir: &Path, db: &Database) -> Result<(), ArchiveError> {
    let claimed = match claim(path, extraction_dir) {
        Ok(p) => p,
        Err(source) => {
            return Err(ArchiveError::Claim {
                path: path.display().to_string(),
                source,
            })
        }
    };

    match ingest_archive(&claimed, db).await {
        Ok(report) => {
            info!(
                archive = %claimed.display(),
                spots = report.spots_inserted,
                noise = report.noise_inserted,
                skipped = report.lines_skipped,
                "ingest succeeded, removing archive"
            );
            let _ = std::fs::remove_file(&claimed);
            Ok(())
        }
        Err(e) => {
            match e.severity() {
                Severity::Poisonous | Severity::TransientNetwork => {
                    quarantine_or_retry(&claimed, extraction_dir);
                }
                Severity::FatalConfig => {
                    quarantine_now(&claimed, extraction_dir);
                }
                _ => {}
            }
            Err(e)
        }
    }
}

/// Moves a claimed archive that failed extraction to `failed/` once it has
/// accumulated [`MAX_EXTRACT_ATTEMPTS`] prior attempts (tracked via a
/// `.attempt<N>` suffix baked into the claimed filename), otherwise bumps
/// the suffix and leaves it for the next scan pass.
fn quarantine_or_retry(claimed: &Path, extraction_dir: &Path) {
    let attempt = current_attempt(claimed) + 1;
    if attempt >= MAX_EXTRACT_ATTEMPTS {
        let dest = extraction_dir.join("failed").join(
            claimed
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown-archive".to_string()),
        );
        warn!(from = %claimed.display(), to = %dest.display(), attempt, "quarantining archive after repeated failures");
        let _ = std::fs::rename(claimed, dest);
        return;
    }

    let new_name = format!(
        "{}.attempt{attempt}",
        claimed.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    );
    let dest = claimed.with_file_name(new_name);
    let _ = std::fs::rename(claimed, dest);
}

/// Moves a claimed archive straight to `failed/` without consulting its
/// attempt counter, for failures retrying can never fix (a permanent
/// database error, schema mismatch, bad credentials).
fn quarantine_now(claimed: &Path, extraction_dir: &Path) {
    let dest = extraction_dir.join("failed").join(
        claimed
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown-archive".to_string()),
    );
    warn!(from = %claimed.display(), to = %dest.display(), "quarantining archive after permanent failure");
    let _ = std::fs::rename(claimed, dest);
}

fn current_attempt(path: &Path) -> u32 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.rsplit_once(".attempt"))
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(0)
}

fn list_archives(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_archive(&path) {
            found.push(path);
        }
    }
    Ok(found)
}

/// Lists files left directly under `extraction_dir` by a previous failed
/// attempt (claimed filenames carry a UUID prefix and, after a failed
/// extraction, an `.attemptN` suffix that [`is_archive`] no longer
/// recognizes). Excludes the `failed/` quarantine subdirectory.
fn list_retry_candidates(extraction_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !extraction_dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(extraction_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_suffix_round_trips() {
        let path = Path::new("/tmp/abc-archive.tbz.attempt2");
        assert_eq!(current_attempt(path), 2);
        let fresh = Path::new("/tmp/abc-archive.tbz");
        assert_eq!(current_attempt(fresh), 0);
    }

    #[test]
    fn retry_candidates_are_rescanned_but_failed_dir_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let extraction_dir = dir.path().join("extraction");
        let failed_dir = extraction_dir.join("failed");
        std::fs::create_dir_all(&failed_dir).unwrap();

        let retry_file = extraction_dir.join("uuid-archive.tbz.attempt1");
        std::fs::write(&retry_file, b"x").unwrap();
        std::fs::write(failed_dir.join("quarantined.tbz"), b"x").unwrap();

        let found = list_retry_candidates(&extraction_dir).unwrap();
        assert_eq!(found, vec![retry_file]);
    }
}
