//! The scraper's poll loop: fetch, dedup, insert-or-cache, periodic replay.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wsprnet_cache::DiskCache;
use wsprnet_config::RuntimeConfig;
use wsprnet_core::error::Classified;
use wsprnet_core::model::Spot;
use wsprnet_db::Database;
use wsprnet_session::AggregatorSession;

/// How many recently-seen spot ids to keep for client-side dedup against
/// overlapping fetch windows. Large enough to cover several poll intervals
/// worth of upstream replay without unbounded growth.
const DEDUP_WINDOW: usize = 20_000;

pub struct ScraperLoop {
    session: AggregatorSession,
    db: Database,
    cache: DiskCache,
    config: RuntimeConfig,
    session_file: PathBuf,
    seen_ids: HashSet<u64>,
    high_water_id: u64,
    iteration: u64,
}

impl ScraperLoop {
    pub fn new(
        session: AggregatorSession,
        db: Database,
        cache: DiskCache,
        config: RuntimeConfig,
        session_file: PathBuf,
    ) -> Self {
        let high_water_id = session.highest_seen_spot_id;
        Self {
            session,
            db,
            cache,
            config,
            session_file,
            seen_ids: HashSet::new(),
            high_water_id,
            iteration: 0,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let interval = self.config.scraper.fetch_interval();
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "scraper tick failed");
                if is_fatal(&e) {
                    return Err(e);
                }
            }

            self.iteration += 1;
            if self.iteration % self.config.scraper.replay_period as u64 == 0 {
                if let Err(e) = self.cache.replay_all(&self.db).await {
                    warn!(error = %e, "periodic cache replay failed");
                }
            }

            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        if let Err(e) = self.session.save(&self.session_file) {
            warn!(error = %e, "failed to persist session state on shutdown");
        }
        info!("scraper loop exiting");
        Ok(())
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let fetched = self.session.fetch_recent_spots(self.high_water_id).await?;

        let fresh: Vec<Spot> = fetched
            .into_iter()
            .filter(|s| self.seen_ids.insert(s.id))
            .collect();

        if let Some(max_id) = fresh.iter().map(|s| s.id).max() {
            self.high_water_id = self.high_water_id.max(max_id);
        }

        if fresh.is_empty() {
            debug!("no new spots this tick");
            self.trim_seen_ids();
            return Ok(());
        }

        info!(count = fresh.len(), "fetched new spots");

        let overflow: Vec<Spot> = fresh.iter().filter(|s| s.is_frequency_overflow()).cloned().collect();

        match self.db.insert_batch("spots", &fresh).await {
            Ok(()) => {
                if !overflow.is_empty() {
                    if let Err(e) = self.db.insert_batch("spots_frequency_overflow", &overflow).await {
                        warn!(error = %e, count = overflow.len(), "failed to insert overflow side-table rows");
                    }
                }
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, count = fresh.len(), "db unavailable, writing batch to disk cache");
                self.cache.write_batch(&fresh)?;
            }
            Err(e) => return Err(e.into()),
        }

        self.trim_seen_ids();
        if let Err(e) = self.session.save(&self.session_file) {
            warn!(error = %e, "failed to persist session state");
        }
        Ok(())
    }

    fn trim_seen_ids(&mut self) {
        if self.seen_ids.len() <= DEDUP_WINDOW {
            return;
        }
        let mut ids: Vec<u64> = self.seen_ids.iter().copied().collect();
        ids.sort_unstable();
        let cutoff = ids[ids.len() - DEDUP_WINDOW];
        self.seen_ids.retain(|id| *id >= cutoff);
    }
}

/// True if `e` wraps a session or database error whose severity should
/// terminate the loop rather than be logged and retried next tick.
fn is_fatal(e: &anyhow::Error) -> bool {
    if let Some(e) = e.downcast_ref::<wsprnet_session::SessionError>() {
        return e.severity().is_fatal();
    }
    if let Some(e) = e.downcast_ref::<wsprnet_db::DbError>() {
        return e.severity().is_fatal();
    }
    false
}

