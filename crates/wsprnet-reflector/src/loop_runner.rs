//! Top-level reflector loop: one scan task plus one transfer task per
//! destination, running independently on their own intervals.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wsprnet_config::Destination;

use crate::error::ReflectorError;
use crate::scan::FanOutState;
use crate::transfer::TransferWorker;

pub struct ReflectorLoop {
    incoming_glob: String,
    spool_base_dir: PathBuf,
    destinations: Vec<Destination>,
    bandwidth_limit_kbps: u32,
    transfer_timeout: Duration,
    retry_max: u32,
    scan_interval: Duration,
    transfer_interval: Duration,
}

impl ReflectorLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        incoming_glob: String,
        spool_base_dir: PathBuf,
        destinations: Vec<Destination>,
        bandwidth_limit_kbps: u32,
        transfer_timeout: Duration,
        retry_max: u32,
        scan_interval: Duration,
        transfer_interval: Duration,
    ) -> Self {
        Self {
            incoming_glob,
            spool_base_dir,
            destinations,
            bandwidth_limit_kbps,
            transfer_timeout,
            retry_max,
            scan_interval,
            transfer_interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let incoming_dir = incoming_dir_from_glob(&self.incoming_glob);
        FanOutState::verify_same_filesystem(&incoming_dir, &self.spool_base_dir, &self.destinations)?;

        let scan_task = self.spawn_scan_task(shutdown.clone());
        let transfer_tasks: Vec<_> = self
            .destinations
            .iter()
            .cloned()
            .map(|destination| self.spawn_transfer_task(destination, shutdown.clone()))
            .collect();

        scan_task.await?;
        for task in transfer_tasks {
            task.await?;
        }

        info!("reflector loop exiting");
        Ok(())
    }

    fn spawn_scan_task(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let incoming_glob = self.incoming_glob.clone();
        let spool_base_dir = self.spool_base_dir.clone();
        let destinations = self.destinations.clone();
        let interval = self.scan_interval;

        tokio::spawn(async move {
            let mut state = FanOutState::new();
            loop {
                if shutdown.is_cancelled() {
                    break;
                }
                if let Err(e) = state.scan_and_link(&incoming_glob, &spool_base_dir, &destinations) {
                    error!(error = %e, "scan phase failed");
                }
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    fn spawn_transfer_task(
        &self,
        destination: Destination,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let spool_base_dir = self.spool_base_dir.clone();
        let bandwidth_limit_kbps = self.bandwidth_limit_kbps;
        let timeout = self.transfer_timeout;
        let retry_max = self.retry_max;
        let interval = self.transfer_interval;

        tokio::spawn(async move {
            let mut worker = TransferWorker::new(destination, spool_base_dir, bandwidth_limit_kbps, timeout, retry_max);
            loop {
                if shutdown.is_cancelled() {
                    break;
                }
                if let Err(e) = worker.run_one_tick().await {
                    error!(error = %e, "transfer tick failed");
                }
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }
}

/// Best-effort recovery of the directory a glob pattern scans, used only
/// for the same-filesystem check. Takes everything before the first glob
/// metacharacter.
fn incoming_dir_from_glob(pattern: &str) -> PathBuf {
    let cut = pattern.find(['*', '?', '[']).unwrap_or(pattern.len());
    let prefix = &pattern[..cut];
    let dir = match prefix.rfind('/') {
        Some(idx) => &prefix[..idx],
        None => ".",
    };
    PathBuf::from(if dir.is_empty() { "/" } else { dir })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_directory_prefix_from_glob() {
        assert_eq!(incoming_dir_from_glob("/srv/incoming/*.tbz"), PathBuf::from("/srv/incoming"));
        assert_eq!(incoming_dir_from_glob("./incoming/*"), PathBuf::from("./incoming"));
    }
}
