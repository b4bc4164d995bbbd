use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("session expired, please log in again")]
    AuthExpired,

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("render target '{0}' is missing")]
    RenderTargetMissing(String),

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("cancelled by operator")]
    Cancelled,
}

/// Coarse classification used when deciding how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthExpired,
    Validation,
    Network,
    RenderTargetMissing,
    Local,
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::AuthExpired => ErrorKind::AuthExpired,
            ConsoleError::Rejected { .. } | ConsoleError::Decode(_) => ErrorKind::Validation,
            ConsoleError::Network(_) => ErrorKind::Network,
            ConsoleError::RenderTargetMissing(_) => ErrorKind::RenderTargetMissing,
            ConsoleError::Io(_) | ConsoleError::Invalid(_) | ConsoleError::Cancelled => {
                ErrorKind::Local
            }
        }
    }

    /// Text shown to the operator. Transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Network(e) => {
                tracing::debug!("transport failure: {}", e);
                "failed to connect to server".to_string()
            }
            ConsoleError::Rejected { status, message } if message.trim().is_empty() => {
                format!("request failed ({})", status)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;
