//! Normalizes a provider's wire response into the domain shapes `wa-case`
//! persists: assistant text, tool calls, and (optionally) structured
//! output.

use wa_core::{AssistantMeta, ToolCall};

use crate::error::{AgentError, AgentResult};
use crate::provider::ChatResponse;

/// The normalized result of one agent call. Carries everything
/// `AssistantMsg::new` needs plus the usage bookkeeping `AssistantMeta`
/// tracks.
#[derive(Debug, Clone, Default)]
pub struct AssistantContent {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub structured_output: Option<serde_json::Value>,
    pub meta: AssistantMeta,
}

/// Normalizes `response` from `provider_key`/`model`. Returns an error only
/// when the provider returned zero choices — an empty-but-present choice
/// (no text, no tool calls) is valid and becomes an `AssistantContent` with
/// everything `None`/empty, left for the caller to decide what to do with.
pub fn normalize(
    response: ChatResponse,
    provider_key: &str,
    model: &str,
) -> AgentResult<AssistantContent> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Response { provider: provider_key.to_string(), message: "no choices in response".to_string() })?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let input: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&call.function.arguments)
                .unwrap_or_default();
            ToolCall { id: call.id, name: call.function.name, input }
        })
        .collect();

    let meta = AssistantMeta {
        provider: Some(provider_key.to_string()),
        model: Some(model.to_string()),
        tokens_input: response.usage.as_ref().and_then(|u| u.prompt_tokens),
        tokens_output: response.usage.as_ref().and_then(|u| u.completion_tokens),
        tokens_total: response.usage.as_ref().and_then(|u| u.total_tokens),
    };

    Ok(AssistantContent { text: choice.message.content, tool_calls, structured_output: None, meta })
}

/// Extracts structured output from assistant text: first by parsing the
/// whole string as JSON (the shape a `response_format: json_object` call
/// returns), then by scanning for the first fenced ```json``` (or bare
/// ```) code block, for providers that only honor that instruction via the
/// system prompt rather than a dedicated response mode.
pub fn extract_structured_output(text: &str) -> AgentResult<serde_json::Value> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) {
        return Ok(value);
    }

    let fence = regex::Regex::new(r"```(?:json)?\s*\n([\s\S]*?)\n```").unwrap();
    if let Some(captures) = fence.captures(text) {
        let candidate = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate.trim()) {
            return Ok(value);
        }
    }

    Err(AgentError::NoStructuredOutput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChoiceMessage, Choice, UsageInfo};

    #[test]
    fn normalizes_text_and_usage() {
        let response = ChatResponse {
            choices: vec![Choice { message: ChoiceMessage { content: Some("hi".to_string()), tool_calls: Vec::new() } }],
            usage: Some(UsageInfo { prompt_tokens: Some(10), completion_tokens: Some(5), total_tokens: Some(15) }),
        };
        let content = normalize(response, "openai", "gpt-4o").unwrap();
        assert_eq!(content.text.as_deref(), Some("hi"));
        assert_eq!(content.meta.tokens_total, Some(15));
    }

    #[test]
    fn errors_on_empty_choices() {
        let response = ChatResponse { choices: Vec::new(), usage: None };
        assert!(normalize(response, "openai", "gpt-4o").is_err());
    }

    #[test]
    fn extracts_bare_json() {
        let value = extract_structured_output(r#"{"action": "reply"}"#).unwrap();
        assert_eq!(value["action"], "reply");
    }

    #[test]
    fn extracts_fenced_json_block() {
        let text = "Here you go:\n```json\n{\"action\": \"reply\"}\n```\nThanks.";
        let value = extract_structured_output(text).unwrap();
        assert_eq!(value["action"], "reply");
    }

    #[test]
    fn errors_when_nothing_parses() {
        assert!(extract_structured_output("just prose, no json here").is_err());
    }
}
