use thiserror::Error;
use wsprnet_core::error::{Classified, Severity};

#[derive(Debug, Error)]
pub enum ReflectorError {
    #[error("destination {name} is not on the same filesystem as the incoming spool")]
    CrossFilesystem { name: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transfer subprocess for {destination} failed: {detail}")]
    TransferFailed { destination: String, detail: String },
}

impl Classified for ReflectorError {
    fn severity(&self) -> Severity {
        match self {
            ReflectorError::CrossFilesystem { .. } => Severity::FatalEnvironment,
            ReflectorError::Io(_) => Severity::TransientResource,
            ReflectorError::TransferFailed { .. } => Severity::TransientNetwork,
        }
    }
}
