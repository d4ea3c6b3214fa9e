//! The tagged message hierarchy. Every persisted message document carries a
//! `basemodel` discriminator; this module models that as a closed enum rather
//! than runtime type inspection, so the discriminator lives entirely in the
//! derived `Serialize`/`Deserialize` impls below.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};
use crate::media::MediaData;
use crate::time::{derive_message_id, now_utc_iso};
use crate::tool::{ToolCall, ToolResult};

/// Fields shared by every message variant. Flattened into each variant's
/// JSON representation, alongside the `basemodel` tag the enum itself adds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageCommon {
    pub origin: String,
    pub case_id: u64,
    pub idempotency_key: String,
    pub time_created: String,
    pub time_received: String,
    pub id: String,
}

/// Inputs shared by every variant constructor. `case_id` has no sensible
/// default, so callers always set it explicitly via struct-update syntax.
#[derive(Debug, Clone, Default)]
pub struct MessageParams {
    pub origin: String,
    pub case_id: u64,
    pub idempotency_key: Option<String>,
    pub time_created: Option<String>,
    pub time_received: Option<String>,
}

impl MessageCommon {
    fn new(basemodel: &str, params: MessageParams) -> Self {
        let time_received = params.time_received.unwrap_or_else(now_utc_iso);
        let time_created = params.time_created.unwrap_or_else(now_utc_iso);
        let idempotency_key = params.idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        let id = derive_message_id(&time_received, basemodel);
        Self {
            origin: params.origin,
            case_id: params.case_id,
            idempotency_key,
            time_created,
            time_received,
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserContentMsg {
    #[serde(flatten)]
    pub common: MessageCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaData>,
}

impl UserContentMsg {
    pub fn new(params: MessageParams, text: Option<String>, mut media: Option<MediaData>) -> CoreResult<Self> {
        let has_text = text.as_deref().is_some_and(|t| !t.is_empty());
        if !has_text && media.is_none() {
            return Err(CoreError::validation("UserContentMsg requires text or media"));
        }
        let common = MessageCommon::new("UserContentMsg", params);
        if let Some(media) = media.as_mut() {
            media.rename_for_message(&common.id);
        }
        Ok(Self { common, text, media })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractiveChoice {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInteractiveReplyMsg {
    #[serde(flatten)]
    pub common: MessageCommon,
    pub choice: InteractiveChoice,
}

impl UserInteractiveReplyMsg {
    pub fn new(params: MessageParams, choice: InteractiveChoice) -> Self {
        Self { common: MessageCommon::new("UserInteractiveReplyMsg", params), choice }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerTextMsg {
    #[serde(flatten)]
    pub common: MessageCommon,
    pub text: String,
}

impl ServerTextMsg {
    pub fn new(params: MessageParams, text: impl Into<String>) -> CoreResult<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(CoreError::validation("ServerTextMsg requires non-empty text"));
        }
        Ok(Self { common: MessageCommon::new("ServerTextMsg", params), text })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InteractiveOptsType {
    Button,
    List,
}

impl InteractiveOptsType {
    fn option_cap(self) -> usize {
        match self {
            Self::Button => 3,
            Self::List => 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractiveOption {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInteractiveOptsMsg {
    #[serde(flatten)]
    pub common: MessageCommon,
    #[serde(rename = "type")]
    pub kind: InteractiveOptsType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    pub options: Vec<InteractiveOption>,
}

impl ServerInteractiveOptsMsg {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: MessageParams,
        kind: InteractiveOptsType,
        body: impl Into<String>,
        header: Option<String>,
        footer: Option<String>,
        button: Option<String>,
        options: Vec<InteractiveOption>,
    ) -> CoreResult<Self> {
        let cap = kind.option_cap();
        if options.len() < 2 {
            return Err(CoreError::validation("interactive options require at least 2 entries"));
        }
        if options.len() > cap {
            return Err(CoreError::validation(format!(
                "{kind:?} interactive options cap at {cap}, got {}",
                options.len()
            )));
        }
        Ok(Self {
            common: MessageCommon::new("ServerInteractiveOptsMsg", params),
            kind,
            header,
            body: body.into(),
            footer,
            button,
            options,
        })
    }
}

/// Provider bookkeeping attached to an `AssistantMsg`, populated by the agent
/// after normalizing a provider response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_input: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_output: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantMsg {
    #[serde(flatten)]
    pub common: MessageCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub st_output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub st_out_bm: Option<String>,
    #[serde(flatten)]
    pub meta: AssistantMeta,
}

impl AssistantMsg {
    pub fn new(
        params: MessageParams,
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
        st_output: Option<Value>,
        st_out_bm: Option<String>,
        meta: AssistantMeta,
    ) -> CoreResult<Self> {
        let has_text = text.as_deref().is_some_and(|t| !t.is_empty());
        if !has_text && tool_calls.is_empty() && st_output.is_none() {
            return Err(CoreError::validation(
                "AssistantMsg must carry text, tool_calls, or structured output",
            ));
        }
        Ok(Self {
            common: MessageCommon::new("AssistantMsg", params),
            text,
            tool_calls,
            st_output,
            st_out_bm,
            meta,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResultsMsg {
    #[serde(flatten)]
    pub common: MessageCommon,
    pub tool_results: Vec<ToolResult>,
}

impl ToolResultsMsg {
    pub fn new(params: MessageParams, tool_results: Vec<ToolResult>) -> CoreResult<Self> {
        if tool_results.is_empty() {
            return Err(CoreError::validation("ToolResultsMsg requires at least one tool result"));
        }
        Ok(Self { common: MessageCommon::new("ToolResultsMsg", params), tool_results })
    }
}

/// The closed sum type. `basemodel` is added by serde as the externally
/// visible tag; it is never a field on the variant structs themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "basemodel")]
pub enum Message {
    UserContentMsg(UserContentMsg),
    UserInteractiveReplyMsg(UserInteractiveReplyMsg),
    ServerTextMsg(ServerTextMsg),
    ServerInteractiveOptsMsg(ServerInteractiveOptsMsg),
    AssistantMsg(AssistantMsg),
    ToolResultsMsg(ToolResultsMsg),
}

impl Message {
    pub fn common(&self) -> &MessageCommon {
        match self {
            Self::UserContentMsg(m) => &m.common,
            Self::UserInteractiveReplyMsg(m) => &m.common,
            Self::ServerTextMsg(m) => &m.common,
            Self::ServerInteractiveOptsMsg(m) => &m.common,
            Self::AssistantMsg(m) => &m.common,
            Self::ToolResultsMsg(m) => &m.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn basemodel(&self) -> &'static str {
        match self {
            Self::UserContentMsg(_) => "UserContentMsg",
            Self::UserInteractiveReplyMsg(_) => "UserInteractiveReplyMsg",
            Self::ServerTextMsg(_) => "ServerTextMsg",
            Self::ServerInteractiveOptsMsg(_) => "ServerInteractiveOptsMsg",
            Self::AssistantMsg(_) => "AssistantMsg",
            Self::ToolResultsMsg(_) => "ToolResultsMsg",
        }
    }

    /// Role this message plays in a provider chat-completion transcript.
    /// Server messages map to `"user"` — the server speaks on the user's
    /// behalf in this channel, not as a separate participant.
    pub fn role(&self) -> &'static str {
        match self {
            Self::UserContentMsg(_)
            | Self::UserInteractiveReplyMsg(_)
            | Self::ServerTextMsg(_)
            | Self::ServerInteractiveOptsMsg(_) => "user",
            Self::AssistantMsg(_) => "assistant",
            Self::ToolResultsMsg(_) => "tool",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(case_id: u64) -> MessageParams {
        MessageParams { origin: "whatsapp".into(), case_id, ..Default::default() }
    }

    #[test]
    fn user_content_requires_text_or_media() {
        assert!(UserContentMsg::new(params(1), None, None).is_err());
        assert!(UserContentMsg::new(params(1), Some("hi".into()), None).is_ok());
    }

    #[test]
    fn user_content_renames_media_to_message_id() {
        let content = crate::media::MediaContent { mime: "image/jpeg".into(), content: b"x".to_vec() };
        let media = MediaData::from_content("image/jpeg", &content);
        let msg = UserContentMsg::new(params(1), None, Some(media)).unwrap();
        assert!(msg.media.unwrap().name.ends_with(".jpeg"));
    }

    #[test]
    fn server_interactive_opts_enforces_button_cap() {
        let options = |n: usize| {
            (0..n).map(|i| InteractiveOption { id: i.to_string(), title: i.to_string(), description: None }).collect::<Vec<_>>()
        };
        assert!(ServerInteractiveOptsMsg::new(params(1), InteractiveOptsType::Button, "body", None, None, None, options(3)).is_ok());
        assert!(ServerInteractiveOptsMsg::new(params(1), InteractiveOptsType::Button, "body", None, None, None, options(4)).is_err());
        assert!(ServerInteractiveOptsMsg::new(params(1), InteractiveOptsType::List, "body", None, None, None, options(10)).is_ok());
        assert!(ServerInteractiveOptsMsg::new(params(1), InteractiveOptsType::List, "body", None, None, None, options(11)).is_err());
        assert!(ServerInteractiveOptsMsg::new(params(1), InteractiveOptsType::List, "body", None, None, None, options(1)).is_err());
    }

    #[test]
    fn assistant_msg_rejects_empty() {
        assert!(AssistantMsg::new(params(1), None, Vec::new(), None, None, AssistantMeta::default()).is_err());
        assert!(AssistantMsg::new(params(1), Some("hi".into()), Vec::new(), None, None, AssistantMeta::default()).is_ok());
    }

    #[test]
    fn tool_results_requires_at_least_one() {
        assert!(ToolResultsMsg::new(params(1), Vec::new()).is_err());
        assert!(ToolResultsMsg::new(params(1), vec![ToolResult::ok("t1", "done")]).is_ok());
    }

    #[test]
    fn role_mapping_treats_server_as_user() {
        let msg = Message::ServerTextMsg(ServerTextMsg::new(params(1), "hi").unwrap());
        assert_eq!(msg.role(), "user");
    }

    #[test]
    fn tag_round_trips_through_json() {
        let msg = Message::UserContentMsg(UserContentMsg::new(params(1), Some("hi".into()), None).unwrap());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["basemodel"], "UserContentMsg");
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_basemodel_tag_fails_to_deserialize() {
        let raw = serde_json::json!({"basemodel": "SomethingElse", "origin": "x"});
        assert!(serde_json::from_value::<Message>(raw).is_err());
    }
}
