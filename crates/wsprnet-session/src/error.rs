use thiserror::Error;
use wsprnet_core::error::{Classified, Severity};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to (de)serialize session state: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error persisting session: {0}")]
    Io(#[from] std::io::Error),
    #[error("three consecutive re-login attempts failed: bad credentials")]
    FatalCredentials,
    #[error("response did not contain the expected data marker")]
    UnexpectedResponse,
}

impl Classified for SessionError {
    fn severity(&self) -> Severity {
        match self {
            SessionError::FatalCredentials => Severity::FatalConfig,
            SessionError::Request(_) | SessionError::UnexpectedResponse => {
                Severity::TransientNetwork
            }
            SessionError::Serde(_) | SessionError::Io(_) => Severity::DataDefect,
        }
    }
}
