//! Configuration and worker-loop error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is missing")]
    MissingVariable(String),
    #[error("failed to parse environment variable {variable}: {source}")]
    ParseError {
        variable: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] wa_queue::QueueError),
    #[error(transparent)]
    Case(#[from] wa_case::CaseError),
    #[error(transparent)]
    Core(#[from] wa_core::CoreError),
    #[error(transparent)]
    WhatsApp(#[from] wa_whatsapp::WhatsAppError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
