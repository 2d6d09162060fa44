//! Process-wide logging init, shared by all three service binaries.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Text or JSON log formatting, selected by the `--json-logs` CLI flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initializes the global `tracing` subscriber. `verbosity` is the 0..3
/// scale from (`0` = warn, `3` = trace). `log_file`, if set, is
/// rotated past `log_max_mb` by renaming the current file to a `.1` suffix
/// before reopening — the services normally run under a supervisor that
/// rotates externally, but the config surface still names these keys.
pub fn init(verbosity: u8, format: LogFormat, log_file: Option<&Path>, log_max_mb: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(path) = log_file {
        if let Err(e) = rotate_if_needed(path, log_max_mb) {
            eprintln!("log rotation check failed for {}: {e}", path.display());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap_or_else(|e| panic!("failed to open log file {}: {e}", path.display()));
        let writer = file.with_max_level(tracing::Level::TRACE);
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);
        match format {
            LogFormat::Json => subscriber.json().init(),
            LogFormat::Text => subscriber.init(),
        }
    } else {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        match format {
            LogFormat::Json => subscriber.json().init(),
            LogFormat::Text => subscriber.init(),
        }
    }
}

fn rotate_if_needed(path: &Path, log_max_mb: u64) -> io::Result<()> {
    if log_max_mb == 0 {
        return Ok(());
    }
    let Ok(meta) = fs::metadata(path) else {
        return Ok(());
    };
    if meta.len() > log_max_mb * 1024 * 1024 {
        let rotated = path.with_extension("1");
        fs::rename(path, rotated)?;
    }
    Ok(())
}
