//! Case storage layer (C3): resolves the key layout from §3 of the design
//! and layers typed read/write operations over the raw object store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wa_core::{CaseIndex, CaseManifest, Message, MediaContent, UserData};
use wa_core::{CoreError, CoreResult};

use crate::object_store::ObjectStore;

/// Resolves every key under `<operator_id>/<user_id>/...` and layers typed
/// operations on top of the raw object store. Holds a mutable `case_id`
/// cursor, set by the caller before any case-scoped operation — mirroring
/// how the case handler above it tracks "the case currently being worked".
pub struct CaseStorage {
    store: ObjectStore,
    operator_id: String,
    user_id: String,
    case_id: Option<u64>,
}

impl CaseStorage {
    pub fn new(store: ObjectStore, operator_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { store, operator_id: operator_id.into(), user_id: user_id.into(), case_id: None }
    }

    pub fn set_case_id(&mut self, case_id: u64) {
        self.case_id = Some(case_id);
    }

    pub fn case_id(&self) -> Option<u64> {
        self.case_id
    }

    pub fn user_prefix(&self) -> String {
        format!("{}/{}", self.operator_id, self.user_id)
    }

    pub fn user_data_key(&self) -> String {
        format!("{}/user_data.json", self.user_prefix())
    }

    pub fn case_index_key(&self) -> String {
        format!("{}/case_index.json", self.user_prefix())
    }

    pub fn dedup_key(&self, idempotency_key: &str) -> String {
        format!("{}/dedup/{idempotency_key}.json", self.user_prefix())
    }

    pub fn cases_prefix(&self) -> String {
        format!("{}/cases", self.user_prefix())
    }

    fn case_prefix_for(&self, case_id: u64) -> String {
        format!("{}/{case_id}", self.cases_prefix())
    }

    fn require_case_id(&self) -> CoreResult<u64> {
        self.case_id.ok_or_else(|| CoreError::internal("case-scoped operation attempted with no case_id cursor set"))
    }

    pub fn manifest_key(&self, case_id: u64) -> String {
        format!("{}/case_manifest.json", self.case_prefix_for(case_id))
    }

    pub fn message_key(&self, case_id: u64, message_id: &str) -> String {
        format!("{}/messages/{message_id}.json", self.case_prefix_for(case_id))
    }

    pub fn media_key(&self, case_id: u64, filename: &str) -> String {
        format!("{}/media/{filename}", self.case_prefix_for(case_id))
    }

    pub async fn json_read<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        if !self.store.head(key).await {
            return Ok(None);
        }
        let bytes = self.store.get(key).await?;
        let value = serde_json::from_slice(&bytes).map_err(CoreError::Serialization)?;
        Ok(Some(value))
    }

    pub async fn json_write<T: Serialize>(&self, key: &str, obj: &T) -> CoreResult<()> {
        self.store.put_json(key, obj).await
    }

    pub async fn dedup_exists(&self, idempotency_key: &str) -> bool {
        self.store.head(&self.dedup_key(idempotency_key)).await
    }

    pub async fn dedup_write(&self, idempotency_key: &str) -> CoreResult<()> {
        self.json_write(&self.dedup_key(idempotency_key), &serde_json::json!({ "idempotency_key": idempotency_key })).await
    }

    pub async fn user_data_load(&self) -> CoreResult<Option<UserData>> {
        self.json_read(&self.user_data_key()).await
    }

    pub async fn user_data_write(&self, user_data: &UserData) -> CoreResult<()> {
        self.json_write(&self.user_data_key(), user_data).await
    }

    pub async fn case_index_load(&self) -> CoreResult<CaseIndex> {
        Ok(self.json_read(&self.case_index_key()).await?.unwrap_or_default())
    }

    pub async fn case_index_write(&self, index: &CaseIndex) -> CoreResult<()> {
        self.json_write(&self.case_index_key(), index).await
    }

    /// Reads and rehydrates the message at `message_id` within the current
    /// case. An absent key or an unrecognized `basemodel` tag both resolve
    /// to `None`, keeping the case usable in the face of a malformed entry.
    pub async fn message_read(&self, message_id: &str) -> CoreResult<Option<Message>> {
        let case_id = self.require_case_id()?;
        let key = self.message_key(case_id, message_id);
        if !self.store.head(&key).await {
            return Ok(None);
        }
        let bytes = self.store.get(&key).await?;
        match serde_json::from_slice::<Message>(&bytes) {
            Ok(message) => Ok(Some(message)),
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "dropping message with unrecognized basemodel tag");
                Ok(None)
            }
        }
    }

    pub async fn message_write(&self, message: &Message) -> CoreResult<()> {
        let common = message.common();
        let key = self.message_key(common.case_id, &common.id);
        self.json_write(&key, message).await
    }

    pub async fn media_get(&self, filename: &str) -> CoreResult<Option<Vec<u8>>> {
        let case_id = self.require_case_id()?;
        let key = self.media_key(case_id, filename);
        if !self.store.head(&key).await {
            return Ok(None);
        }
        Ok(Some(self.store.get(&key).await?))
    }

    /// Writes media content under `<case>/media/<filename>`, first-writer-wins:
    /// a second write for the same filename is a silent no-op.
    pub async fn media_write(&self, filename: &str, content: &MediaContent) -> CoreResult<()> {
        let case_id = self.require_case_id()?;
        let key = self.media_key(case_id, filename);
        if self.store.head(&key).await {
            return Ok(());
        }
        self.store.put(&key, content.content.clone(), &content.mime).await
    }

    /// Lists `cases/` directories and returns `1 + max(existing numeric dirs)`,
    /// or `1` if none exist yet.
    pub async fn get_next_case_id(&self) -> CoreResult<u64> {
        let dirs = self.store.list_directories(&self.cases_prefix()).await?;
        let max = dirs.iter().filter_map(|name| name.parse::<u64>().ok()).max();
        Ok(max.map(|m| m + 1).unwrap_or(1))
    }

    pub async fn manifest_load(&self, case_id: u64) -> CoreResult<Option<CaseManifest>> {
        self.json_read(&self.manifest_key(case_id)).await
    }

    pub async fn manifest_write(&self, manifest: &CaseManifest) -> CoreResult<()> {
        self.json_write(&self.manifest_key(manifest.case_id), manifest).await
    }

    /// Appends `message` to the case manifest's `message_ids`, bumps
    /// `time_last_message`, and rewrites the manifest. Returns the updated
    /// manifest so the caller can continue operating on it without a second
    /// read.
    pub async fn manifest_append(&self, case_id: u64, message: &Message) -> CoreResult<CaseManifest> {
        let mut manifest = self
            .manifest_load(case_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("case manifest {case_id} not found")))?;
        let common = message.common();
        manifest.append_message(&common.id, &common.time_created, &common.time_received);
        self.manifest_write(&manifest).await?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::ObjectStore;

    fn storage() -> CaseStorage {
        CaseStorage::new(ObjectStore::for_testing("test-bucket"), "OP1", "U1")
    }

    #[test]
    fn key_layout_matches_design() {
        let storage = storage();
        assert_eq!(storage.user_data_key(), "OP1/U1/user_data.json");
        assert_eq!(storage.case_index_key(), "OP1/U1/case_index.json");
        assert_eq!(storage.dedup_key("wamid.A"), "OP1/U1/dedup/wamid.A.json");
        assert_eq!(storage.manifest_key(1), "OP1/U1/cases/1/case_manifest.json");
        assert_eq!(storage.message_key(1, "m1"), "OP1/U1/cases/1/messages/m1.json");
        assert_eq!(storage.media_key(1, "m1.jpg"), "OP1/U1/cases/1/media/m1.jpg");
    }

    #[tokio::test]
    async fn case_scoped_operation_without_cursor_fails() {
        let storage = storage();
        assert!(storage.message_read("m1").await.is_err());
    }
}
