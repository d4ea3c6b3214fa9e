//! The end-user profile persisted at `<operator>/<user>/user_data.json`.

use serde::{Deserialize, Serialize};

/// Profile information accumulated about a single end user. Created on first
/// contact and mutated only to append a previously-unseen display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserData {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

impl UserData {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            region_code: None,
            language_code: None,
            country: None,
            language: None,
            names: Vec::new(),
        }
    }

    /// Appends `name` if not already present. Returns whether it changed
    /// anything, so callers only persist when there was actually a mutation.
    pub fn observe_name(&mut self, name: &str) -> bool {
        if name.is_empty() || self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_name_is_append_only_unique() {
        let mut user = UserData::new("U1");
        assert!(user.observe_name("Ada"));
        assert!(!user.observe_name("Ada"));
        assert!(user.observe_name("Ada Lovelace"));
        assert_eq!(user.names, vec!["Ada", "Ada Lovelace"]);
    }

    #[test]
    fn observe_name_ignores_empty() {
        let mut user = UserData::new("U1");
        assert!(!user.observe_name(""));
        assert!(user.names.is_empty());
    }
}
