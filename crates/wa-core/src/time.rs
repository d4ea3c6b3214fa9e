//! ISO-UTC timestamp helpers shared by the domain model and the storage layer.
//!
//! Every persisted timestamp in this system is a UTC ISO-8601 string with a
//! literal `Z` suffix and no fractional seconds once it reaches a manifest.

use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Current instant as an ISO-8601 string with microsecond precision, `Z` suffix.
pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored ISO-8601 timestamp. Returns `None` on malformed input
/// rather than erroring — callers fall back to `now` when this happens,
/// mirroring the original implementation's tolerant parsing.
pub fn utc_iso_to_dt(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a WhatsApp webhook `timestamp` (unix seconds, as a string) into
/// an ISO-8601 UTC string.
pub fn unix_to_utc_iso(unix_seconds: i64) -> String {
    Utc.timestamp_opt(unix_seconds, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Truncate to whole seconds and render with a literal `Z` suffix, as
/// required for `CaseManifest.time_last_message`.
pub fn truncate_to_seconds_z(dt: DateTime<Utc>) -> String {
    dt.date_naive()
        .and_hms_opt(dt.time().hour(), dt.time().minute(), dt.time().second())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(dt)
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Derive the message id from its `time_received` timestamp and basemodel
/// tag: `T`→`_`, `:`→`-`, `.`→`-`, strip the trailing `Z`, append `_<tag>`.
pub fn derive_message_id(time_received: &str, basemodel: &str) -> String {
    let stamp = time_received
        .replace('T', "_")
        .replace(':', "-")
        .replace('.', "-")
        .trim_end_matches('Z')
        .to_string();
    format!("{stamp}_{basemodel}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_rfc3339() {
        let now = now_utc_iso();
        assert!(utc_iso_to_dt(&now).is_some());
    }

    #[test]
    fn truncates_to_whole_seconds_with_z() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(truncate_to_seconds_z(dt), "2024-01-02T03:04:05Z");
    }

    #[test]
    fn derives_id_from_timestamp_and_tag() {
        let id = derive_message_id("2024-01-02T03:04:05.123456Z", "UserContentMsg");
        assert_eq!(id, "2024-01-02_03-04-05-123456_UserContentMsg");
    }

    #[test]
    fn unix_conversion_is_stable() {
        let iso = unix_to_utc_iso(1_700_000_000);
        assert!(iso.starts_with("2023-11-14T22:13:20"));
    }
}
