use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use wsprnet_config::RuntimeConfig;
use wsprnet_core::logging::{self, LogFormat};
use wsprnet_reflector::ReflectorLoop;

#[derive(Parser, Debug)]
#[command(name = "wsprnet-reflector", version)]
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
        destinations = config.reflector.destinations.len(),
        "starting wsprnet-reflector"
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_signal.cancel();
    });

    let reflector = ReflectorLoop::new(
        config.reflector.incoming_glob.clone(),
        config.reflector.spool_base_dir.clone(),
        config.reflector.destinations.clone(),
        config.reflector.bandwidth_limit_kbps,
        config.reflector.transfer_timeout(),
        config.reflector.retry_max,
        config.reflector.scan_interval(),
        config.reflector.transfer_interval(),
    );
    reflector.run(shutdown).await
}
