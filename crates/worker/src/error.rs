use floe_common::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Connector(#[from] floe_common::Error),

    #[error("Split task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WorkerError {
    /// The code surfaced to the host runtime. Connector failures keep their
    /// own code.
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkerError::Config(_) | WorkerError::InvalidSetting(_) => ErrorCode::Configuration,
            WorkerError::Connector(e) => e.code(),
            WorkerError::Task(_) => ErrorCode::Internal,
        }
    }
}
