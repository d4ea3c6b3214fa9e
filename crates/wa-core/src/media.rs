//! Media metadata and content payloads carried by messages.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Media metadata persisted alongside a message document. The actual bytes
/// live under `cases/<case_id>/media/<message_id>.<ext>`, resolved by the
/// storage layer — this struct only ever travels inside a message JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaData {
    pub mime: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl MediaData {
    /// Derive metadata from raw content: hashes it, sizes it, and assigns a
    /// placeholder name that the caller (`UserContentMsg::new`) rewrites to
    /// `<message_id>.<ext>` once the message id is known.
    pub fn from_content(mime: impl Into<String>, content: &MediaContent) -> Self {
        let mime = mime.into();
        let ext = extension_for_mime(&mime);
        let mut hasher = Sha256::new();
        hasher.update(&content.content);
        let sha256 = hex::encode(hasher.finalize());
        Self {
            mime,
            name: format!("media.{ext}"),
            sha256: Some(sha256),
            size: Some(content.content.len() as u64),
        }
    }

    /// Rewrite `name` to `<message_id>.<ext>`, preserving the original extension.
    pub fn rename_for_message(&mut self, message_id: &str) {
        let ext = extension_for_mime(&self.mime);
        self.name = format!("{message_id}.{ext}");
    }
}

/// Raw media bytes, only ever held in memory while ingesting or sending.
#[derive(Clone)]
pub struct MediaContent {
    pub mime: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for MediaContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaContent")
            .field("mime", &self.mime)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Best-effort mime → file extension mapping for the media filenames WhatsApp
/// commonly sends. Falls back to the subtype when unrecognized.
pub fn extension_for_mime(mime: &str) -> String {
    match mime.split(';').next().unwrap_or(mime).trim() {
        "image/jpeg" => "jpeg".to_string(),
        "image/png" => "png".to_string(),
        "image/webp" => "webp".to_string(),
        "video/mp4" => "mp4".to_string(),
        "video/3gpp" => "3gp".to_string(),
        "audio/ogg" => "ogg".to_string(),
        "audio/mpeg" => "mp3".to_string(),
        "audio/mp4" => "m4a".to_string(),
        "application/pdf" => "pdf".to_string(),
        other => other.rsplit('/').next().unwrap_or("bin").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sha256_and_size() {
        let content = MediaContent { mime: "image/jpeg".into(), content: b"hello".to_vec() };
        let media = MediaData::from_content("image/jpeg", &content);
        assert_eq!(media.size, Some(5));
        assert!(media.sha256.is_some());
    }

    #[test]
    fn renames_to_message_id() {
        let content = MediaContent { mime: "image/jpeg".into(), content: b"hello".to_vec() };
        let mut media = MediaData::from_content("image/jpeg", &content);
        media.rename_for_message("2024-01-02_03-04-05_UserContentMsg");
        assert_eq!(media.name, "2024-01-02_03-04-05_UserContentMsg.jpeg");
    }
}
