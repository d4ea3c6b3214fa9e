//! Errors surfaced by the case handler orchestrator.

use thiserror::Error;

pub type CaseResult<T> = Result<T, CaseError>;

#[derive(Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Core(#[from] wa_core::CoreError),
    #[error("whatsapp error: {0}")]
    WhatsApp(#[from] wa_whatsapp::WhatsAppError),
}
