use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use wsprnet_cache::DiskCache;
use wsprnet_config::RuntimeConfig;
use wsprnet_core::logging::{self, LogFormat};
use wsprnet_db::{Database, DbConfig};
use wsprnet_scraper::ScraperLoop;
use wsprnet_session::AggregatorSession;

#[derive(Parser, Debug)]
#[command(name = "wsprnet-scraper", version)]
struct Cli {
    /// Path to a TOML config file; overrides the default search order.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RuntimeConfig::load(cli.config.as_deref())?;

    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Text };
    let verbosity = cli.verbose.max(config.logging.verbosity);
    logging::init(verbosity, format, config.logging.log_file.as_deref(), config.logging.log_max_mb);

    info!(fetch_interval_secs = config.scraper.fetch_interval_secs, "starting wsprnet-scraper");

    let db = Database::connect(DbConfig {
        host: config.db.db_host.clone(),
        port: config.db.db_port,
        user: config.db.db_user.clone(),
        password: config.db.db_password.clone(),
        chunk_size: config.batch_size,
        ..DbConfig::default()
    });
    db.ensure_schema().await?;

    let cache = DiskCache::open(&config.scraper.cache_dir);

    let session_file = config.scraper.session_file.clone();
    let session = AggregatorSession::restore_or_new(
        "https://wsprnet.org",
        config.scraper.upstream_username.clone(),
        config.scraper.upstream_password.clone(),
        &session_file,
        config.scraper.session_ttl(),
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_signal.cancel();
    });

    let scraper = ScraperLoop::new(session, db, cache, config, session_file);
    scraper.run(shutdown).await
}
