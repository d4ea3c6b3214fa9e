//! Errors surfaced by agent configuration and invocation.

use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid provider spec: {0}")]
    InvalidProviderSpec(String),

    #[error("unknown provider key: {0}")]
    UnknownProvider(String),

    #[error("provider {0} does not support tool calling")]
    ToolsNotSupported(String),

    #[error("missing required environment variable: {0}")]
    MissingCredential(String),

    #[error("request to provider {provider} failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} returned an unparseable response: {message}")]
    Response { provider: String, message: String },

    #[error("no structured output found in the model's response")]
    NoStructuredOutput,

    #[error(transparent)]
    Core(#[from] wa_core::CoreError),
}
