use crate::types::{ErrorResponse, InteractiveRow, Media, Message, MessageResponse, TemplateMessage};
use reqwest::{multipart, Client as HttpClient, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};
use url::Url;

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Access token for WhatsApp Business API
    pub access_token: String,
    /// Phone number ID for sending messages
    pub phone_number_id: String,
    /// Base URL for WhatsApp Cloud API (default: https://graph.facebook.com/v18.0)
    pub base_url: String,
    /// Webhook verify token
    pub webhook_verify_token: String,
    /// App secret for webhook signature verification
    pub app_secret: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            base_url: "https://graph.facebook.com/v18.0".to_string(),
            webhook_verify_token: String::new(),
            app_secret: String::new(),
        }
    }
}

/// WhatsApp Cloud API client
#[derive(Debug)]
pub struct WhatsAppClient {
    config: WhatsAppConfig,
    http_client: HttpClient,
}

/// Media upload response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUploadResponse {
    pub id: String,
}

/// Media info response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfoResponse {
    pub url: String,
    pub mime_type: String,
    pub sha256: String,
    pub file_size: u64,
    pub id: String,
    pub messaging_product: String,
}

impl WhatsAppClient {
    /// Create a new WhatsApp client
    pub fn new(config: WhatsAppConfig) -> Result<Self, WhatsAppError> {
        let http_client = HttpClient::builder()
            .user_agent("pytake-whatsapp/0.1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Send a text message
    pub async fn send_text_message<S: Into<String>>(
        &self,
        to: S,
        text: S,
    ) -> Result<MessageResponse, WhatsAppError> {
        let message = Message::text(to, text);
        self.send_message(message).await
    }

    /// Send an image message from URL
    pub async fn send_image_url<S: Into<String>>(
        &self,
        to: S,
        image_url: S,
        caption: Option<S>,
    ) -> Result<MessageResponse, WhatsAppError> {
        let mut media = Media::from_url(image_url);
        if let Some(cap) = caption {
            media = media.with_caption(cap);
        }
        let message = Message::image(to, media);
        self.send_message(message).await
    }

    /// Send an image message from uploaded media ID
    pub async fn send_image_id<S: Into<String>>(
        &self,
        to: S,
        media_id: S,
        caption: Option<S>,
    ) -> Result<MessageResponse, WhatsAppError> {
        let mut media = Media::from_id(media_id);
        if let Some(cap) = caption {
            media = media.with_caption(cap);
        }
        let message = Message::image(to, media);
        self.send_message(message).await
    }

    /// Send a document message from URL
    pub async fn send_document_url<S: Into<String>>(
        &self,
        to: S,
        document_url: S,
        filename: Option<S>,
        caption: Option<S>,
    ) -> Result<MessageResponse, WhatsAppError> {
        let mut media = Media::from_url(document_url);
        if let Some(name) = filename {
            media = media.with_filename(name);
        }
        if let Some(cap) = caption {
            media = media.with_caption(cap);
        }
        let message = Message::document(to, media);
        self.send_message(message).await
    }

    /// Send a document message from uploaded media ID
    pub async fn send_document_id<S: Into<String>>(
        &self,
        to: S,
        media_id: S,
        filename: Option<S>,
        caption: Option<S>,
    ) -> Result<MessageResponse, WhatsAppError> {
        let mut media = Media::from_id(media_id);
        if let Some(name) = filename {
            media = media.with_filename(name);
        }
        if let Some(cap) = caption {
            media = media.with_caption(cap);
        }
        let message = Message::document(to, media);
        self.send_message(message).await
    }

    /// Send a template message
    pub async fn send_template_message<S: Into<String>>(
        &self,
        to: S,
        template: TemplateMessage,
    ) -> Result<MessageResponse, WhatsAppError> {
        let message = Message::template(to, template);
        self.send_message(message).await
    }

    /// Send an interactive button or list message. `kind` is `"button"` or
    /// `"list"`; text bodies are not chunked here since interactive bodies
    /// are expected to stay well under the 4096-char text limit.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_interactive<S: Into<String>>(
        &self,
        to: S,
        kind: &str,
        header: Option<String>,
        body: String,
        footer: Option<String>,
        button: Option<String>,
        options: Vec<InteractiveRow>,
    ) -> Result<MessageResponse, WhatsAppError> {
        let message = Message::interactive(to, kind, header, body, footer, button, options);
        self.send_message(message).await
    }

    /// Send a text message, recursively halving bodies longer than 4096
    /// characters into multiple messages. Returns one response per chunk.
    pub async fn send_text_chunked<S: Into<String> + Clone>(
        &self,
        to: S,
        text: &str,
    ) -> Result<Vec<MessageResponse>, WhatsAppError> {
        let mut responses = Vec::new();
        for chunk in chunk_text(text, 4096) {
            let message = Message::text(to.clone().into(), chunk);
            responses.push(self.send_message(message).await?);
        }
        Ok(responses)
    }

    /// Send a generic message
    pub async fn send_message(&self, message: Message) -> Result<MessageResponse, WhatsAppError> {
        let url = format!(
            "{}/{}/messages",
            self.config.base_url, self.config.phone_number_id
        );

        debug!("Sending message to: {}", message.to);
        debug!("Message content: {:?}", message.content);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .header("Content-Type", "application/json")
            .json(&message)
            .send()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Upload media file
    pub async fn upload_media<P: AsRef<Path>>(
        &self,
        file_path: P,
        mime_type: &str,
    ) -> Result<MediaUploadResponse, WhatsAppError> {
        let path = file_path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WhatsAppError::InvalidFile("Invalid filename".to_string()))?;

        // Read file content
        let mut file = File::open(path)
            .await
            .map_err(|e| WhatsAppError::FileRead(e.to_string()))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .await
            .map_err(|e| WhatsAppError::FileRead(e.to_string()))?;

        // Create multipart form
        let file_part = multipart::Part::bytes(buffer)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| WhatsAppError::InvalidFile(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("type", mime_type.to_string())
            .text("messaging_product", "whatsapp");

        let url = format!("{}/{}/media", self.config.base_url, self.config.phone_number_id);

        debug!("Uploading media file: {}", filename);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Upload media from bytes
    pub async fn upload_media_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<MediaUploadResponse, WhatsAppError> {
        let file_part = multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| WhatsAppError::InvalidFile(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("type", mime_type.to_string())
            .text("messaging_product", "whatsapp");

        let url = format!("{}/{}/media", self.config.base_url, self.config.phone_number_id);

        debug!("Uploading media bytes: {}", filename);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Get media info by ID
    pub async fn get_media_info(&self, media_id: &str) -> Result<MediaInfoResponse, WhatsAppError> {
        let url = format!("{}/{}", self.config.base_url, media_id);

        debug!("Getting media info for ID: {}", media_id);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .send()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Download media by URL
    pub async fn download_media(&self, media_url: &str) -> Result<Vec<u8>, WhatsAppError> {
        debug!("Downloading media from URL: {}", media_url);

        let response = self
            .http_client
            .get(media_url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .send()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        if !response.status().is_success() {
            error!("Failed to download media: {}", response.status());
            return Err(WhatsAppError::ApiError(format!(
                "Failed to download media: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    /// Mark message as read
    pub async fn mark_message_read(&self, message_id: &str) -> Result<(), WhatsAppError> {
        let url = format!(
            "{}/{}/messages",
            self.config.base_url, self.config.phone_number_id
        );

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id
        });

        debug!("Marking message as read: {}", message_id);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        if response.status().is_success() {
            info!("Message marked as read: {}", message_id);
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("Failed to mark message as read: {}", error_text);
            Err(WhatsAppError::ApiError(error_text))
        }
    }

    /// Handle HTTP response and parse result or error
    async fn handle_response<T>(&self, response: Response) -> Result<T, WhatsAppError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| WhatsAppError::HttpClient(e.to_string()))?;

        debug!("API response status: {}", status);
        debug!("API response body: {}", response_text);

        if status.is_success() {
            serde_json::from_str(&response_text)
                .map_err(|e| WhatsAppError::ParseError(e.to_string()))
        } else {
            // Try to parse as WhatsApp error response
            match serde_json::from_str::<ErrorResponse>(&response_text) {
                Ok(error_response) => {
                    error!("WhatsApp API error: {:?}", error_response.error);
                    Err(WhatsAppError::ApiError(error_response.error.message))
                }
                Err(_) => {
                    error!("HTTP error {}: {}", status, response_text);
                    Err(WhatsAppError::HttpError {
                        status: status.as_u16(),
                        message: response_text,
                    })
                }
            }
        }
    }

    /// Validate phone number format
    pub fn validate_phone_number(phone: &str) -> Result<String, WhatsAppError> {
        let cleaned = phone.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
        
        if cleaned.len() < 10 || cleaned.len() > 15 {
            return Err(WhatsAppError::InvalidPhoneNumber(format!(
                "Invalid phone number length: {}",
                phone
            )));
        }

        // Ensure it starts with country code
        if !cleaned.starts_with('+') && cleaned.len() >= 10 {
            Ok(cleaned)
        } else {
            Ok(cleaned.trim_start_matches('+').to_string())
        }
    }

    /// Validate URL format
    pub fn validate_url(url: &str) -> Result<String, WhatsAppError> {
        match Url::parse(url) {
            Ok(parsed_url) => {
                if parsed_url.scheme() == "http" || parsed_url.scheme() == "https" {
                    Ok(url.to_string())
                } else {
                    Err(WhatsAppError::InvalidUrl(format!(
                        "URL must use HTTP or HTTPS: {}",
                        url
                    )))
                }
            }
            Err(_) => Err(WhatsAppError::InvalidUrl(format!("Invalid URL: {}", url))),
        }
    }

}

/// Recursively halve `text` until every chunk is at most `max_len`
/// characters, preserving order so the chunks concatenate back to the
/// original.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }
    let mid = chars.len() / 2;
    let mut result = chunk_text(&chars[..mid].iter().collect::<String>(), max_len);
    result.extend(chunk_text(&chars[mid..].iter().collect::<String>(), max_len));
    result
}

/// Converts the markdown formatting an agent commonly emits into WhatsApp's
/// own markup: `**bold**` to `*bold*`, `__italic__` to `_italic_`, and drops
/// heading markers entirely since WhatsApp has no heading concept.
pub fn markdown_to_whatsapp(markdown_text: &str) -> String {
    let bold = regex::Regex::new(r"\*\*(.*?)\*\*").unwrap();
    let text = bold.replace_all(markdown_text, "*$1*");
    let italic = regex::Regex::new(r"__(.*?)__").unwrap();
    let text = italic.replace_all(&text, "_$1_");
    let heading = regex::Regex::new(r"(?m)^#+\s+").unwrap();
    heading.replace_all(&text, "").into_owned()
}

/// WhatsApp API errors
#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("File read error: {0}")]
    FileRead(String),
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_number() {
        assert!(WhatsAppClient::validate_phone_number("1234567890").is_ok());
        assert!(WhatsAppClient::validate_phone_number("+1234567890").is_ok());
        assert!(WhatsAppClient::validate_phone_number("123-456-7890").is_ok());
        assert!(WhatsAppClient::validate_phone_number("123").is_err());
        assert!(WhatsAppClient::validate_phone_number("12345678901234567890").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(WhatsAppClient::validate_url("https://example.com/image.jpg").is_ok());
        assert!(WhatsAppClient::validate_url("http://example.com/doc.pdf").is_ok());
        assert!(WhatsAppClient::validate_url("ftp://example.com/file.txt").is_err());
        assert!(WhatsAppClient::validate_url("invalid-url").is_err());
    }

    #[test]
    fn chunk_text_under_limit_is_single_chunk() {
        assert_eq!(chunk_text("hello", 4096), vec!["hello".to_string()]);
    }

    #[test]
    fn chunk_text_splits_and_preserves_order() {
        let text = "a".repeat(10);
        let chunks = chunk_text(&text, 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn markdown_to_whatsapp_converts_emphasis_and_drops_headings() {
        let input = "# Title\n**bold** and __italic__ text";
        let output = markdown_to_whatsapp(input);
        assert_eq!(output, "Title\n*bold* and _italic_ text");
    }
}