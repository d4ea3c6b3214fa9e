//! Case bookkeeping: the per-user open-case pointer and per-case manifest.

use serde::{Deserialize, Serialize};

use crate::time::{now_utc_iso, truncate_to_seconds_z, utc_iso_to_dt};

/// `<operator>/<user>/case_index.json`. At most one open case per user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseIndex {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_case_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Open,
    Resolved,
    Timeout,
}

/// `<operator>/<user>/cases/<case_id>/case_manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaseManifest {
    pub case_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: CaseStatus,
    pub time_opened: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_closed: Option<String>,
    #[serde(default)]
    pub message_ids: Vec<String>,
}

impl CaseManifest {
    pub fn open(case_id: u64) -> Self {
        Self {
            case_id,
            model: None,
            status: CaseStatus::Open,
            time_opened: now_utc_iso(),
            time_last_message: None,
            time_closed: None,
            message_ids: Vec::new(),
        }
    }

    pub fn mark_resolved(&mut self) {
        self.status = CaseStatus::Resolved;
        self.time_closed = Some(now_utc_iso());
    }

    pub fn mark_timeout(&mut self) {
        self.status = CaseStatus::Timeout;
        self.time_closed = Some(now_utc_iso());
    }

    /// Append `message_id` if not already present, and bump
    /// `time_last_message` to `max(time_created, time_received, now)`,
    /// truncated to whole seconds with a `Z` suffix, if that's later than the
    /// current value. Idempotent: calling this twice with the same inputs is
    /// a no-op the second time.
    pub fn append_message(&mut self, message_id: &str, time_created: &str, time_received: &str) {
        if !self.message_ids.iter().any(|id| id == message_id) {
            self.message_ids.push(message_id.to_string());
        }
        let now = chrono::Utc::now();
        let msg_time = [utc_iso_to_dt(time_created), utc_iso_to_dt(time_received), Some(now)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(now);
        let candidate = truncate_to_seconds_z(msg_time);
        let should_replace = match self.time_last_message.as_deref() {
            Some(existing) => candidate.as_str() > existing,
            None => true,
        };
        if should_replace {
            self.time_last_message = Some(candidate);
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, CaseStatus::Open)
    }

    /// Whether this case has gone stale relative to `stale_after_seconds`,
    /// measured from `time_last_message` (falling back to `time_opened` when
    /// no message has ever been recorded).
    pub fn is_stale(&self, now: chrono::DateTime<chrono::Utc>, stale_after_seconds: i64) -> bool {
        let reference = self
            .time_last_message
            .as_deref()
            .or(Some(self.time_opened.as_str()))
            .and_then(utc_iso_to_dt);
        match reference {
            Some(dt) => (now - dt).num_seconds() >= stale_after_seconds,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_message_is_idempotent() {
        let mut manifest = CaseManifest::open(1);
        manifest.append_message("m1", "2024-01-02T03:04:05.000000Z", "2024-01-02T03:04:05.000000Z");
        manifest.append_message("m1", "2024-01-02T03:04:05.000000Z", "2024-01-02T03:04:05.000000Z");
        assert_eq!(manifest.message_ids, vec!["m1".to_string()]);
    }

    #[test]
    fn time_last_message_never_goes_backwards() {
        let mut manifest = CaseManifest::open(1);
        manifest.append_message("m1", "2024-01-02T03:04:05Z", "2024-01-02T03:04:05Z");
        let first = manifest.time_last_message.clone();
        manifest.append_message("m2", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z");
        assert!(manifest.time_last_message >= first);
    }

    #[test]
    fn staleness_uses_time_last_message() {
        let mut manifest = CaseManifest::open(1);
        manifest.time_opened = "2024-01-01T00:00:00Z".to_string();
        manifest.append_message("m1", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z");
        let now = chrono::Utc::now() + chrono::Duration::hours(49);
        assert!(manifest.is_stale(now, 48 * 3600));
    }
}
