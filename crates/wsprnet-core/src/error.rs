//! Shared error taxonomy, consumed by the leaf error types of
//! every service crate so the propagation policy — only `Fatal*` escapes a
//! loop iteration and terminates the process — stays uniform.

use std::fmt;

/// Which taxonomy bucket an error falls into, and therefore how the caller
/// should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Missing credentials, unreadable config, unparseable schema.
    /// Log and exit nonzero.
    FatalConfig,
    /// Incoming/spool dirs missing, destinations on different filesystems.
    /// Log and exit nonzero at startup; warn and degrade at runtime if possible.
    FatalEnvironment,
    /// Database unreachable, aggregator 5xx, transfer subprocess connection
    /// failure. Retry with backoff; divert to cache/queue; never lose data.
    TransientNetwork,
    /// Disk full, memory pressure. Log, pause, resume when free.
    TransientResource,
    /// Unparseable line, wrong column count, bad grid string. Count,
    /// sample-log, skip; never abort the batch.
    DataDefect,
    /// Archive that repeatedly fails extraction. Quarantine after bounded
    /// retries.
    Poisonous,
}

impl Severity {
    /// Whether this severity must terminate the owning process.
    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::FatalConfig | Severity::FatalEnvironment)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::FatalConfig => "fatal_config",
            Severity::FatalEnvironment => "fatal_environment",
            Severity::TransientNetwork => "transient_network",
            Severity::TransientResource => "transient_resource",
            Severity::DataDefect => "data_defect",
            Severity::Poisonous => "poisonous",
        };
        f.write_str(s)
    }
}

/// Anything that can report which taxonomy bucket it belongs to.
pub trait Classified {
    fn severity(&self) -> Severity;
}
