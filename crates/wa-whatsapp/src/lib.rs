//! # wa-whatsapp
//!
//! Client for the WhatsApp Business Platform Cloud API: sending text,
//! media, template, and interactive messages; verifying and parsing
//! inbound webhook notifications; and formatting outbound text for
//! WhatsApp's rendering rules.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wa_whatsapp::{WhatsAppClient, WhatsAppConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WhatsAppConfig {
//!         access_token: "your_access_token".to_string(),
//!         phone_number_id: "your_phone_number_id".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let client = WhatsAppClient::new(config)?;
//!     client.send_text_message("1234567890", "Hello from Rust!").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{
    chunk_text, markdown_to_whatsapp, MediaInfoResponse, MediaUploadResponse, WhatsAppClient,
    WhatsAppConfig, WhatsAppError,
};
pub use types::{
    AudioMessage, Contact, DocumentMessage, ImageMessage, InteractiveAction, InteractiveButtonReply,
    InteractiveHeader, InteractiveMessage, InteractivePayload, InteractiveRow, InteractiveSection,
    InteractiveTextBlock, LocationMessage, Media, Message, MessageContent, MessageResponse,
    MessageStatus, PhoneNumber, TemplateComponent, TemplateLanguage, TemplateMessage,
    TemplateParameter, TextMessage, VideoMessage,
};
pub use webhook::{
    InboundButtonMessage, InboundButtonReply, InboundContactMessage, InboundInteractiveMessage,
    InboundListReply, InboundLocationMessage, InboundMessage, InboundMessageContext,
    InboundReaction, InboundReferredProduct, InboundTextMessage, MessageStatusUpdate,
    WebhookChallenge, WebhookChange, WebhookEntry, WebhookPayload, WebhookProcessingError,
    WebhookProcessor, WebhookValue, WebhookVerificationError,
};

/// Result type alias for WhatsApp operations
pub type Result<T> = std::result::Result<T, WhatsAppError>;
