//! Polymorphic behavior the orchestrator defers to its caller.
//!
//! The original case handler is a base class with two abstract methods that
//! a concrete subclass fills in. Rust has no inheritance, and a trait object
//! composed into [`crate::handler::CaseHandler`] is a closer fit than a
//! generic parameter threaded through every method: callers can swap the
//! hook per contact without the orchestrator itself becoming generic.

use async_trait::async_trait;
use wa_core::MediaContent;
use wa_whatsapp::InboundMessage;

use crate::error::CaseResult;
use crate::handler::CaseHandler;

/// Case-specific message handling, injected into [`CaseHandler`].
#[async_trait]
pub trait CaseProcessor: Send + Sync {
    /// Process one inbound WhatsApp message already resolved to the active
    /// case. Returns whether the case now needs a generated response.
    async fn process_message(
        &self,
        handler: &mut CaseHandler,
        message: &InboundMessage,
        media_content: Option<MediaContent>,
    ) -> CaseResult<bool>;

    /// Generate (and send) the next response for the active case. Returns
    /// whether another round of generation is needed.
    async fn generate_response(&self, handler: &mut CaseHandler, max_tokens: Option<u64>) -> CaseResult<bool>;
}
