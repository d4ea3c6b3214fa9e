//! The OpenAI-compatible chat-completions wire shape, and the one concrete
//! [`Provider`] implementation that speaks it. Every provider reachable
//! through [`crate::config::lookup_provider`] is addressed through this
//! same request/response shape — it is the lowest common denominator
//! across hosted inference APIs that matter here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderProfile;
use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    /// Ordered fallback model ids for a routed provider to fall over
    /// between on its own infrastructure if `model` fails. Empty when the
    /// agent was configured with a single `provider/model` entry.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls: Vec<WireToolCall>,
}

/// Plain text, or a block array when a message carries inline media.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunctionDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn key(&self) -> &str;
    fn supports_tools(&self) -> bool;
    async fn invoke(&self, request: &ChatRequest) -> AgentResult<ChatResponse>;
}

/// Talks to one entry of the provider registry over its OpenAI-compatible
/// `/chat/completions` endpoint.
pub struct OpenAiCompatibleProvider {
    profile: ProviderProfile,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(profile: ProviderProfile) -> AgentResult<Self> {
        let api_key = match profile.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| AgentError::MissingCredential(var.to_string()))?),
            None => None,
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::Request { provider: profile.key.to_string(), message: e.to_string() })?;
        Ok(Self { profile, api_key, http })
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn key(&self) -> &str {
        self.profile.key
    }

    fn supports_tools(&self) -> bool {
        self.profile.supports_tools
    }

    async fn invoke(&self, request: &ChatRequest) -> AgentResult<ChatResponse> {
        let mut builder = self.http.post(self.profile.base_url).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| AgentError::Request {
            provider: self.profile.key.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AgentError::Request {
            provider: self.profile.key.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AgentError::Request {
                provider: self.profile.key.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        serde_json::from_str(&body).map_err(|e| AgentError::Response {
            provider: self.profile.key.to_string(),
            message: format!("{e}: {body}"),
        })
    }
}
