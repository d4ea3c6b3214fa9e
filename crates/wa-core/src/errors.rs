//! Error types shared across the case engine crates.

use thiserror::Error;

/// Result type used throughout the case engine.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error types for the conversational case engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("lock timeout: {0}")]
    LockTimeout(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider(message.into())
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    pub fn lock_timeout<S: Into<String>>(message: S) -> Self {
        Self::LockTimeout(message.into())
    }

    /// Transient errors are the ones the worker records as an `error` queue
    /// row but keeps polling past; everything else behaves the same way in
    /// this codebase today, but the distinction is kept for callers that
    /// want to special-case retries later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Provider(_) | Self::LockTimeout(_))
    }
}
