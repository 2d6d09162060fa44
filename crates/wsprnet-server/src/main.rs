use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use wsprnet_config::RuntimeConfig;
use wsprnet_core::logging::{self, LogFormat};
use wsprnet_db::{Database, DbConfig};
use wsprnet_server::ServerLoop;

#[derive(Parser, Debug)]
#[command(name = "wsprnet-server", version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

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

    info!(
        incoming_dirs = ?config.server.incoming_dirs,
        workers = config.server.workers,
        "starting wsprnet-server"
    );

    let db = Database::connect(DbConfig {
        host: config.db.db_host.clone(),
        port: config.db.db_port,
        user: config.db.db_user.clone(),
        password: config.db.db_password.clone(),
        chunk_size: config.batch_size,
        ..DbConfig::default()
    });
    db.ensure_schema().await?;

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_signal.cancel();
    });

    let server = ServerLoop::new(
        config.server.incoming_dirs.clone(),
        config.server.extraction_dir.clone(),
        db,
        config.server.workers,
        config.server.loop_interval(),
    );
    server.run(shutdown).await
}
