use thiserror::Error;
use wsprnet_core::error::{Classified, Severity};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to claim archive {path}: {source}")]
    Claim {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decompress/extract {path}: {source}")]
    Extract {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("archive {path} contained no recognizable spot or noise members")]
    Empty { path: String },
    #[error("database insert failed: {0}")]
    Db(#[from] wsprnet_db::DbError),
}

impl Classified for ArchiveError {
    fn severity(&self) -> Severity {
        match self {
            ArchiveError::Claim { .. } => Severity::TransientResource,
            ArchiveError::Extract { .. } | ArchiveError::Empty { .. } => Severity::Poisonous,
            ArchiveError::Db(e) if e.is_transient() => Severity::TransientNetwork,
            ArchiveError::Db(_) => Severity::FatalConfig,
        }
    }
}
