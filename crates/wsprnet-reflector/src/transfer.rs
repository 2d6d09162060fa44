//! Transfer phase: mirror each destination's queue via an external
//! file-mirroring subprocess, retrying failures in place and quarantining
//! files that fail repeatedly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{error, info, warn};
use wsprnet_config::Destination;

use crate::error::ReflectorError;

pub struct TransferWorker {
    destination: Destination,
    spool_base_dir: PathBuf,
    bandwidth_limit_kbps: u32,
    timeout: Duration,
    retry_max: u32,
    failure_counts: HashMap<PathBuf, u32>,
}

impl TransferWorker {
    pub fn new(
        destination: Destination,
        spool_base_dir: PathBuf,
        bandwidth_limit_kbps: u32,
        timeout: Duration,
        retry_max: u32,
    ) -> Self {
        Self {
            destination,
            spool_base_dir,
            bandwidth_limit_kbps,
            timeout,
            retry_max,
            failure_counts: HashMap::new(),
        }
    }

    fn queue_dir(&self) -> PathBuf {
        self.spool_base_dir.join(&self.destination.name)
    }

    fn failed_dir(&self) -> PathBuf {
        self.queue_dir().join("failed")
    }

    pub async fn run_one_tick(&mut self) -> Result<(), ReflectorError> {
        let queue_dir = self.queue_dir();
        std::fs::create_dir_all(&queue_dir)?;
        std::fs::create_dir_all(self.failed_dir())?;

        let files = list_queue_files(&queue_dir)?;
        for file in files {
            match self.transfer_one(&file).await {
                Ok(()) => {
                    let _ = std::fs::remove_file(&file);
                    self.failure_counts.remove(&file);
                    info!(file = %file.display(), destination = %self.destination.name, "transfer succeeded");
                }
                Err(e) => {
                    let count = self.failure_counts.entry(file.clone()).or_insert(0);
                    *count += 1;
                    warn!(
                        file = %file.display(),
                        destination = %self.destination.name,
                        attempt = *count,
                        error = %e,
                        "transfer failed"
                    );
                    if *count >= self.retry_max {
                        self.quarantine(&file);
                    }
                }
            }
        }
        Ok(())
    }

    async fn transfer_one(&self, file: &Path) -> Result<(), ReflectorError> {
        let remote = format!(
            "{}@{}:{}/",
            self.destination.user, self.destination.host, self.destination.path
        );

        let mut command = Command::new("rsync");
        command
            .arg("--archive")
            .arg("--partial")
            .arg(format!("--bwlimit={}", self.bandwidth_limit_kbps))
            .arg(file)
            .arg(&remote)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ReflectorError::TransferFailed {
                destination: self.destination.name.clone(),
                detail: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| ReflectorError::TransferFailed {
                destination: self.destination.name.clone(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ReflectorError::TransferFailed {
                destination: self.destination.name.clone(),
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    fn quarantine(&mut self, file: &Path) {
        let dest = self.failed_dir().join(file.file_name().unwrap_or_default());
        error!(file = %file.display(), to = %dest.display(), "moving file to failed/ after repeated transfer failures");
        let _ = std::fs::rename(file, dest);
        self.failure_counts.remove(file);
    }
}

fn list_queue_files(queue_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(queue_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> Destination {
        Destination {
            name: "alpha".to_string(),
            user: "u".to_string(),
            host: "h".to_string(),
            path: "/remote".to_string(),
        }
    }

    #[tokio::test]
    async fn quarantines_after_retry_max_failures() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("spool");
        let queue = spool.join("alpha");
        std::fs::create_dir_all(&queue).unwrap();
        let file = queue.join("x.tbz");
        std::fs::write(&file, b"data").unwrap();

        let mut worker = TransferWorker::new(dest(), spool.clone(), 2_000, Duration::from_millis(200), 2);

        // `rsync` is almost certainly not reachable at a fake host, so both
        // ticks fail; the second should quarantine the file.
        let _ = worker.run_one_tick().await;
        let _ = worker.run_one_tick().await;

        assert!(!file.exists());
        assert!(queue.join("failed").join("x.tbz").exists());
    }
}
