//! Case handler orchestrator (C5): owns one user's active case, the
//! WhatsApp collaborator, and the in-memory transcript built from it.
//!
//! A [`CaseHandler`] is short-lived: constructed once the user-directory
//! lock is held, driven through one ingestion/response cycle, then dropped.
//! Nothing about its lifetime is durable; everything it reads and writes
//! round-trips through [`CaseStorage`].

use std::sync::Arc;

use wa_core::{
    now_utc_iso, CaseIndex, CaseManifest, InteractiveChoice, InteractiveOption, InteractiveOptsType,
    MediaContent, Message, MessageParams, ServerInteractiveOptsMsg, ServerTextMsg, UserContentMsg,
    UserData, DEFAULT_MAX_CONTEXT_LEN, DEFAULT_TIME_LIMIT_STALE_SECONDS,
};
use wa_core::CoreError;
use wa_storage::CaseStorage;
use wa_whatsapp::{markdown_to_whatsapp, InboundMessage, WhatsAppClient};

use crate::error::{CaseError, CaseResult};

/// Everything the orchestrator needs about the user on the other end of the
/// WhatsApp conversation, separate from the key-layout identity
/// (`operator_id`/`user_id`) stored on [`CaseHandler`] itself.
#[derive(Debug, Clone)]
pub struct Contact {
    /// The E.164 phone number outbound sends are addressed to.
    pub phone: String,
    /// Display name observed on the inbound webhook payload, if any.
    pub profile_name: Option<String>,
}

/// Drives one user's case lifecycle: deciding which case is active, keeping
/// its transcript in memory, ingesting new inbound content, and routing
/// outbound replies back through WhatsApp.
pub struct CaseHandler {
    storage: CaseStorage,
    whatsapp: Arc<WhatsAppClient>,
    operator_id: String,
    user_id: String,
    contact: Contact,
    context: Vec<Message>,
    max_context_len: usize,
    stale_after_seconds: i64,
}

impl CaseHandler {
    pub fn new(
        storage: CaseStorage,
        whatsapp: Arc<WhatsAppClient>,
        operator_id: impl Into<String>,
        user_id: impl Into<String>,
        contact: Contact,
    ) -> Self {
        Self {
            storage,
            whatsapp,
            operator_id: operator_id.into(),
            user_id: user_id.into(),
            contact,
            context: Vec::new(),
            max_context_len: DEFAULT_MAX_CONTEXT_LEN,
            stale_after_seconds: DEFAULT_TIME_LIMIT_STALE_SECONDS,
        }
    }

    pub fn with_stale_after_seconds(mut self, seconds: i64) -> Self {
        self.stale_after_seconds = seconds;
        self
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn case_id(&self) -> Option<u64> {
        self.storage.case_id()
    }

    pub fn context(&self) -> &[Message] {
        &self.context
    }

    pub fn storage(&self) -> &CaseStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut CaseStorage {
        &mut self.storage
    }

    /// Loads the persisted profile, creating one on first contact. Appends
    /// the inbound payload's display name if it hasn't been seen before.
    pub async fn user_data_lookup(&self) -> CaseResult<UserData> {
        let existing = self.storage.user_data_load().await?;
        let is_new = existing.is_none();
        let mut user_data = existing.unwrap_or_else(|| UserData::new(self.user_id.clone()));

        let name_changed = self
            .contact
            .profile_name
            .as_deref()
            .is_some_and(|name| user_data.observe_name(name));

        if is_new || name_changed {
            self.storage.user_data_write(&user_data).await?;
        }
        Ok(user_data)
    }

    /// Resolves the case this user's next message belongs to: the open case
    /// if one exists and hasn't gone stale, otherwise a freshly opened one.
    /// A stale open case is marked `timeout` and the index cleared before a
    /// new case is opened, so at most one case is ever open at a time.
    pub async fn case_decide(&mut self) -> CaseResult<u64> {
        let index = self.storage.case_index_load().await?;
        if let Some(case_id) = index.open_case_id {
            self.storage.set_case_id(case_id);
            if let Some(mut manifest) = self.storage.manifest_load(case_id).await? {
                if manifest.is_open() && !manifest.is_stale(chrono::Utc::now(), self.stale_after_seconds) {
                    return Ok(case_id);
                }
                if manifest.is_open() {
                    manifest.mark_timeout();
                    self.storage.manifest_write(&manifest).await?;
                }
            }
            self.storage.case_index_write(&CaseIndex::default()).await?;
        }
        self.case_open_new().await
    }

    /// Allocates the next case id, persists an open manifest for it, and
    /// records it as this user's open case.
    pub async fn case_open_new(&mut self) -> CaseResult<u64> {
        let case_id = self.storage.get_next_case_id().await?;
        let manifest = CaseManifest::open(case_id);
        self.storage.manifest_write(&manifest).await?;
        self.storage.case_index_write(&CaseIndex { open_case_id: Some(case_id) }).await?;
        self.storage.set_case_id(case_id);
        self.context.clear();
        Ok(case_id)
    }

    /// Marks the active case resolved and clears the user's open-case
    /// pointer. A no-op if no case is currently tracked.
    pub async fn case_mark_as_resolved(&mut self) -> CaseResult<()> {
        let Some(case_id) = self.storage.case_id() else {
            return Ok(());
        };
        if let Some(mut manifest) = self.storage.manifest_load(case_id).await? {
            manifest.mark_resolved();
            self.storage.manifest_write(&manifest).await?;
        }
        self.storage.case_index_write(&CaseIndex::default()).await?;
        Ok(())
    }

    /// Rebuilds the in-memory transcript from the active case's manifest,
    /// optionally keeping only the most recent `truncate` messages. Messages
    /// that fail to deserialize are dropped (see
    /// [`CaseStorage::message_read`]) rather than failing the whole build.
    pub async fn context_build(&mut self, truncate: Option<usize>) -> CaseResult<&[Message]> {
        let case_id = self
            .storage
            .case_id()
            .ok_or_else(|| CoreError::internal("context_build called with no active case"))?;
        let manifest = self
            .storage
            .manifest_load(case_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("case manifest {case_id} not found")))?;

        let ids = manifest.message_ids;
        let window = truncate.unwrap_or(self.max_context_len);
        let start = ids.len().saturating_sub(window);

        let mut messages = Vec::with_capacity(ids.len() - start);
        for id in &ids[start..] {
            if let Some(message) = self.storage.message_read(id).await? {
                messages.push(message);
            }
        }
        self.context = messages;
        Ok(&self.context)
    }

    /// Appends `message` to the in-memory transcript, trimming the oldest
    /// entries once `max_context_len` is exceeded. Does not touch storage —
    /// callers that also want the message persisted call the dedicated
    /// storage methods (`dedup_and_ingest_message`, `send_text`, ...).
    pub fn context_update(&mut self, message: Message) {
        self.context.push(message);
        if self.context.len() > self.max_context_len {
            let overflow = self.context.len() - self.max_context_len;
            self.context.drain(0..overflow);
        }
    }

    /// Converts an inbound WhatsApp webhook message into a `UserContentMsg`
    /// and persists it, unless its idempotency key has already been seen.
    /// The dedup marker is written only after the manifest append succeeds,
    /// so a crash between the two never hides a message that was never
    /// actually recorded.
    pub async fn dedup_and_ingest_message(
        &mut self,
        wa_msg: &InboundMessage,
        media_content: Option<MediaContent>,
    ) -> CaseResult<Option<Message>> {
        let case_id = self
            .storage
            .case_id()
            .ok_or_else(|| CoreError::internal("dedup_and_ingest_message called with no active case"))?;
        let idempotency_key = wa_msg.id.clone();
        if self.storage.dedup_exists(&idempotency_key).await {
            tracing::debug!(idempotency_key, "skipping already-ingested message");
            return Ok(None);
        }

        let time_received = wa_core::time::unix_to_utc_iso(wa_msg.timestamp.parse().unwrap_or(0));
        let params = MessageParams {
            origin: "whatsapp".to_string(),
            case_id,
            idempotency_key: Some(idempotency_key.clone()),
            time_created: Some(time_received.clone()),
            time_received: Some(time_received),
        };

        let text = wa_msg.get_text().map(str::to_string);
        let media = match media_content.as_ref() {
            Some(content) => Some(wa_core::MediaData::from_content(content.mime.clone(), content)),
            None => None,
        };
        let user_msg = UserContentMsg::new(params, text, media)?;

        if let (Some(media_data), Some(content)) = (&user_msg.media, media_content.as_ref()) {
            self.storage.media_write(&media_data.name, content).await?;
        }

        let message = Message::UserContentMsg(user_msg);
        self.storage.message_write(&message).await?;
        self.storage.manifest_append(case_id, &message).await?;
        self.storage.dedup_write(&idempotency_key).await?;

        self.context_update(message.clone());
        Ok(Some(message))
    }

    /// Sends `text` over WhatsApp (normalizing markdown and chunking long
    /// bodies) and persists it as a `ServerTextMsg` on the active case.
    pub async fn send_text(&mut self, text: &str) -> CaseResult<()> {
        let case_id = self
            .storage
            .case_id()
            .ok_or_else(|| CoreError::internal("send_text called with no active case"))?;
        let formatted = markdown_to_whatsapp(text);

        self.whatsapp
            .send_text_chunked(self.contact.phone.clone(), &formatted)
            .await
            .map_err(CaseError::WhatsApp)?;

        let params = MessageParams { origin: "server".to_string(), case_id, ..Default::default() };
        let server_msg = ServerTextMsg::new(params, formatted)?;
        let message = Message::ServerTextMsg(server_msg);
        self.storage.message_write(&message).await?;
        self.storage.manifest_append(case_id, &message).await?;
        self.context_update(message);
        Ok(())
    }

    /// Sends an interactive button or list message and persists it as a
    /// `ServerInteractiveOptsMsg`.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_interactive(
        &mut self,
        kind: InteractiveOptsType,
        body: impl Into<String>,
        header: Option<String>,
        footer: Option<String>,
        button: Option<String>,
        options: Vec<InteractiveOption>,
    ) -> CaseResult<()> {
        let case_id = self
            .storage
            .case_id()
            .ok_or_else(|| CoreError::internal("send_interactive called with no active case"))?;
        let body = body.into();

        let wire_kind = match kind {
            InteractiveOptsType::Button => "button",
            InteractiveOptsType::List => "list",
        };
        let rows = options
            .iter()
            .map(|opt| wa_whatsapp::InteractiveRow {
                id: opt.id.clone(),
                title: opt.title.clone(),
                description: opt.description.clone(),
            })
            .collect();
        self.whatsapp
            .send_interactive(
                self.contact.phone.clone(),
                wire_kind,
                header.clone(),
                body.clone(),
                footer.clone(),
                button.clone(),
                rows,
            )
            .await
            .map_err(CaseError::WhatsApp)?;

        let params = MessageParams { origin: "server".to_string(), case_id, ..Default::default() };
        let server_msg = ServerInteractiveOptsMsg::new(params, kind, body, header, footer, button, options)?;
        let message = Message::ServerInteractiveOptsMsg(server_msg);
        self.storage.message_write(&message).await?;
        self.storage.manifest_append(case_id, &message).await?;
        self.context_update(message);
        Ok(())
    }

    /// Reply-to-choice helper: turns a raw WhatsApp interactive reply into a
    /// `UserInteractiveReplyMsg` and ingests it the same way
    /// `dedup_and_ingest_message` ingests free text, without a media leg.
    pub async fn ingest_interactive_reply(
        &mut self,
        message_id: &str,
        timestamp: &str,
        choice: InteractiveChoice,
    ) -> CaseResult<Option<Message>> {
        let case_id = self
            .storage
            .case_id()
            .ok_or_else(|| CoreError::internal("ingest_interactive_reply called with no active case"))?;
        if self.storage.dedup_exists(message_id).await {
            return Ok(None);
        }
        let time_received = wa_core::time::unix_to_utc_iso(timestamp.parse().unwrap_or(0));
        let params = MessageParams {
            origin: "whatsapp".to_string(),
            case_id,
            idempotency_key: Some(message_id.to_string()),
            time_created: Some(time_received.clone()),
            time_received: Some(time_received),
        };
        let message = Message::UserInteractiveReplyMsg(wa_core::UserInteractiveReplyMsg::new(params, choice));
        self.storage.message_write(&message).await?;
        self.storage.manifest_append(case_id, &message).await?;
        self.storage.dedup_write(message_id).await?;
        self.context_update(message.clone());
        Ok(Some(message))
    }

    /// Current wall-clock instant as the ISO-8601 string convention every
    /// persisted document shares.
    pub fn now(&self) -> String {
        now_utc_iso()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_storage::ObjectStore;
    use wa_whatsapp::WhatsAppConfig;

    fn handler() -> CaseHandler {
        let store = ObjectStore::for_testing("test-bucket");
        let storage = CaseStorage::new(store, "OP1", "U1");
        let whatsapp = Arc::new(WhatsAppClient::new(WhatsAppConfig::default()).unwrap());
        let contact = Contact { phone: "15550001111".to_string(), profile_name: Some("Ada".to_string()) };
        CaseHandler::new(storage, whatsapp, "OP1", "U1", contact)
    }

    // ObjectStore::for_testing talks to real AWS endpoints with fake
    // credentials, so these hit the network; run them explicitly
    // (`cargo test -- --ignored`) against real or fake credentials, not as
    // part of the default offline suite.

    #[tokio::test]
    #[ignore = "hits real S3 endpoints through ObjectStore::for_testing"]
    async fn case_decide_opens_a_case_when_none_exists() {
        let mut handler = handler();
        let case_id = handler.case_decide().await.unwrap();
        assert_eq!(case_id, 1);
        assert_eq!(handler.case_id(), Some(1));
    }

    #[tokio::test]
    #[ignore = "hits real S3 endpoints through ObjectStore::for_testing"]
    async fn case_decide_reuses_open_case_on_second_call() {
        let mut handler = handler();
        let first = handler.case_decide().await.unwrap();
        handler.storage_mut().set_case_id(first);
        let second = handler.case_decide().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    #[ignore = "hits real S3 endpoints through ObjectStore::for_testing"]
    async fn case_mark_as_resolved_clears_the_index() {
        let mut handler = handler();
        handler.case_decide().await.unwrap();
        handler.case_mark_as_resolved().await.unwrap();
        let index = handler.storage().case_index_load().await.unwrap();
        assert!(index.open_case_id.is_none());
    }
}
