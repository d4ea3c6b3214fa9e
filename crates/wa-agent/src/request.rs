//! Turns a case transcript into a [`ChatRequest`] for whichever provider is
//! about to be called.

use base64::Engine;
use wa_core::{Message, MediaContent};

use crate::provider::{ChatMessage, ChatRequest, ContentBlock, ImageUrl, MessageContent, ToolDefinition, ToolFunctionDef, WireFunctionCall, WireToolCall};

/// A tool the agent may call, described the way OpenAI-compatible `tools`
/// entries expect: a name, a human description, and a JSON Schema object
/// for its arguments.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    fn into_wire(self) -> ToolDefinition {
        ToolDefinition {
            kind: "function".to_string(),
            function: ToolFunctionDef { name: self.name, description: self.description, parameters: self.parameters },
        }
    }
}

/// One transcript entry plus the raw media bytes it carries, if any. The
/// case handler holds media bytes only transiently (on ingest, before
/// they're written to storage); this pairs them back up for the one call
/// site that needs the bytes rather than just the `MediaData` metadata.
#[derive(Debug, Clone)]
pub struct ContextItem {
    pub message: Message,
    pub media: Option<MediaContent>,
}

impl From<Message> for ContextItem {
    fn from(message: Message) -> Self {
        Self { message, media: None }
    }
}

/// Inline media under roughly 5MB as a base64 data URL; anything larger
/// (or non-image) becomes a placeholder the model can reason about but not
/// see, rather than bloating the request body.
const MAX_INLINE_MEDIA_BYTES: usize = 5 * 1024 * 1024;

fn content_for_item(item: &ContextItem) -> MessageContent {
    let text = transcript_text(&item.message);
    match &item.media {
        Some(media) if media.mime.starts_with("image/") && media.content.len() <= MAX_INLINE_MEDIA_BYTES => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&media.content);
            let mut blocks = Vec::new();
            if let Some(text) = text {
                blocks.push(ContentBlock::Text { text });
            }
            blocks.push(ContentBlock::ImageUrl { image_url: ImageUrl { url: format!("data:{};base64,{encoded}", media.mime) } });
            MessageContent::Blocks(blocks)
        }
        Some(media) => {
            let placeholder = format!("[SYSTEM] User sent media ({})", media.mime);
            MessageContent::Text(match text {
                Some(text) => format!("{text}\n{placeholder}"),
                None => placeholder,
            })
        }
        None => MessageContent::Text(text.unwrap_or_default()),
    }
}

/// The text a provider sees for one message. `ToolResultsMsg` is handled
/// separately by [`assemble`] since it expands to one wire message per
/// result, keyed by `tool_call_id`.
fn transcript_text(message: &Message) -> Option<String> {
    match message {
        Message::UserContentMsg(m) => m.text.clone(),
        Message::UserInteractiveReplyMsg(m) => Some(format!("{} ({})", m.choice.title, m.choice.id)),
        Message::ServerTextMsg(m) => Some(m.text.clone()),
        Message::ServerInteractiveOptsMsg(m) => {
            let options: Vec<String> = m.options.iter().map(|o| o.title.clone()).collect();
            Some(format!("{}\nOptions: {}", m.body, options.join(", ")))
        }
        Message::AssistantMsg(m) => assistant_content_text(m),
        Message::ToolResultsMsg(_) => None,
    }
}

/// The content a provider sees for an assistant message: its text if
/// present, otherwise its structured output serialized as a JSON string —
/// construction allows a text-less assistant message carrying only
/// structured output (or only tool calls), and such a message must not be
/// sent upstream with empty content.
fn assistant_content_text(m: &wa_core::AssistantMsg) -> Option<String> {
    m.text.clone().or_else(|| m.st_output.as_ref().map(|v| serde_json::to_string(v).unwrap_or_default()))
}

/// Builds the `messages` array: an optional system message first, then one
/// wire message per transcript entry (a `ToolResultsMsg` expands to one
/// `tool` message per result).
fn build_messages(system_prompt: Option<&str>, context: &[ContextItem]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 1);
    if let Some(system_prompt) = system_prompt {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(system_prompt.to_string()),
            tool_call_id: None,
            tool_calls: Vec::new(),
        });
    }

    for item in context {
        match &item.message {
            Message::ToolResultsMsg(m) => {
                for result in &m.tool_results {
                    let content = if let Some(error) = &result.error {
                        format!("error: {error}")
                    } else {
                        result.content.clone()
                    };
                    messages.push(ChatMessage {
                        role: "tool".to_string(),
                        content: MessageContent::Text(content),
                        tool_call_id: Some(result.id.clone()),
                        tool_calls: Vec::new(),
                    });
                }
            }
            Message::AssistantMsg(m) => {
                let tool_calls = m
                    .tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: serde_json::to_string(&call.input).unwrap_or_default(),
                        },
                    })
                    .collect();
                messages.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: MessageContent::Text(assistant_content_text(m).unwrap_or_default()),
                    tool_call_id: None,
                    tool_calls,
                });
            }
            _ => {
                messages.push(ChatMessage {
                    role: item.message.role().to_string(),
                    content: content_for_item(item),
                    tool_call_id: None,
                    tool_calls: Vec::new(),
                });
            }
        }
    }
    messages
}

#[allow(clippy::too_many_arguments)]
pub fn assemble(
    model: &str,
    temperature: f32,
    max_tokens: Option<u64>,
    system_prompt: Option<&str>,
    context: &[ContextItem],
    tools: Vec<ToolSchema>,
    want_structured_output: bool,
    fallback_models: &[String],
) -> ChatRequest {
    let messages = build_messages(system_prompt, context);
    let wire_tools: Vec<ToolDefinition> = tools.into_iter().map(ToolSchema::into_wire).collect();
    let tool_choice = if wire_tools.is_empty() { None } else { Some(serde_json::json!("auto")) };
    let response_format = want_structured_output.then(|| serde_json::json!({ "type": "json_object" }));

    ChatRequest {
        model: model.to_string(),
        messages,
        temperature,
        max_tokens,
        tools: wire_tools,
        tool_choice,
        response_format,
        models: fallback_models.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_core::{MessageParams, UserContentMsg};

    fn params() -> MessageParams {
        MessageParams { origin: "whatsapp".to_string(), case_id: 1, ..Default::default() }
    }

    #[test]
    fn plain_text_message_has_no_media_blocks() {
        let msg = Message::UserContentMsg(UserContentMsg::new(params(), Some("hi".to_string()), None).unwrap());
        let request = assemble("gpt-4o", 0.2, None, None, &[ContextItem::from(msg)], Vec::new(), false, &[]);
        assert!(matches!(request.messages[0].content, MessageContent::Text(_)));
    }

    #[test]
    fn image_under_limit_is_inlined_as_data_url() {
        let media = MediaContent { mime: "image/png".to_string(), content: vec![1, 2, 3] };
        let msg = Message::UserContentMsg(
            UserContentMsg::new(params(), None, Some(wa_core::MediaData::from_content("image/png", &media))).unwrap(),
        );
        let item = ContextItem { message: msg, media: Some(media) };
        let request = assemble("gpt-4o", 0.2, None, None, &[item], Vec::new(), false, &[]);
        match &request.messages[0].content {
            MessageContent::Blocks(blocks) => {
                assert!(blocks.iter().any(|b| matches!(b, ContentBlock::ImageUrl { .. })));
            }
            other => panic!("expected content blocks, got {other:?}"),
        }
    }

    #[test]
    fn media_placeholder_matches_the_spec_literal_format() {
        let media = MediaContent { mime: "application/pdf".to_string(), content: vec![1, 2, 3] };
        let msg = Message::UserContentMsg(
            UserContentMsg::new(params(), None, Some(wa_core::MediaData::from_content("application/pdf", &media))).unwrap(),
        );
        let item = ContextItem { message: msg, media: Some(media) };
        let request = assemble("gpt-4o", 0.2, None, None, &[item], Vec::new(), false, &[]);
        match &request.messages[0].content {
            MessageContent::Text(text) => assert_eq!(text, "[SYSTEM] User sent media (application/pdf)"),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn assistant_message_with_only_structured_output_serializes_it_as_content() {
        let msg = Message::AssistantMsg(
            wa_core::AssistantMsg::new(
                params(),
                None,
                Vec::new(),
                Some(serde_json::json!({"action": "reply"})),
                None,
                wa_core::AssistantMeta::default(),
            )
            .unwrap(),
        );
        let request = assemble("gpt-4o", 0.2, None, None, &[ContextItem::from(msg)], Vec::new(), false, &[]);
        match &request.messages[0].content {
            MessageContent::Text(text) => assert_eq!(text, r#"{"action":"reply"}"#),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn tool_results_expand_to_one_message_per_result() {
        let msg = Message::ToolResultsMsg(
            wa_core::ToolResultsMsg::new(
                params(),
                vec![wa_core::ToolResult::ok("call-1", "done"), wa_core::ToolResult::ok("call-2", "done")],
            )
            .unwrap(),
        );
        let request = assemble("gpt-4o", 0.2, None, None, &[ContextItem::from(msg)], Vec::new(), false, &[]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn fallback_models_attach_to_the_request_for_the_provider_to_route() {
        let fallbacks = vec!["openai/gpt-4o-mini".to_string()];
        let request = assemble("anthropic/claude-3.5-sonnet", 0.2, None, None, &[], Vec::new(), false, &fallbacks);
        assert_eq!(request.models, fallbacks);
    }
}
