//! Ties configuration, request assembly, provider invocation, and response
//! normalization together behind one entry point: [`Agent::invoke`].

use crate::config::{lookup_provider, AgentConfig};
use crate::error::{AgentError, AgentResult};
use crate::provider::{OpenAiCompatibleProvider, Provider};
use crate::request::{self, ContextItem, ToolSchema};
use crate::response::{self, AssistantContent};

/// A pure function applied to assistant text after normalization, when
/// text is present. `wa-whatsapp::markdown_to_whatsapp` is the shipped
/// default; callers can add more (e.g. stripping a provider's "thinking"
/// preamble) by constructing with [`Agent::with_post_processors`].
pub type PostProcessor = Box<dyn Fn(String) -> String + Send + Sync>;

pub struct Agent {
    config: AgentConfig,
    provider: Box<dyn Provider>,
    post_processors: Vec<PostProcessor>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> AgentResult<Self> {
        let profile = lookup_provider(&config.primary.provider_key)?.clone();
        let provider: Box<dyn Provider> = Box::new(OpenAiCompatibleProvider::new(profile)?);
        Ok(Self { config, provider, post_processors: Vec::new() })
    }

    pub fn with_post_processors(mut self, post_processors: Vec<PostProcessor>) -> Self {
        self.post_processors = post_processors;
        self
    }

    /// Calls the configured provider exactly once. When the config carries
    /// a fallback chain, the remaining models ride along on the request as
    /// routing metadata for the provider's own infrastructure to fall over
    /// between — this agent never re-dispatches a failed call to a
    /// different provider itself (spec.md §7: "the agent itself does not
    /// retry providers"). Structured output, if requested, is extracted
    /// from the response once it comes back.
    pub async fn invoke(
        &self,
        context: &[ContextItem],
        tools: Vec<ToolSchema>,
        want_structured_output: bool,
    ) -> AgentResult<AssistantContent> {
        if !tools.is_empty() {
            self.config.require_tools()?;
        }
        let system_prompt = crate::config::concat_system_prompts(&self.config.system_prompts)?;

        let chat_request = request::assemble(
            &self.config.primary.model,
            self.config.temperature,
            self.config.max_tokens,
            system_prompt.as_deref(),
            context,
            tools,
            want_structured_output,
            &self.config.fallback_models,
        );

        let chat_response = self.provider.invoke(&chat_request).await?;
        let mut content = response::normalize(chat_response, self.provider.key(), &self.config.primary.model)?;
        if want_structured_output {
            extract_and_clear_text(&mut content);
        }
        content.text = content.text.map(|text| self.apply_post_processors(text));
        Ok(content)
    }

    fn apply_post_processors(&self, text: String) -> String {
        self.post_processors.iter().fold(text, |acc, f| f(acc))
    }
}

/// Attempts to extract structured output from `content.text`. On success,
/// per spec.md §4.6 ("clear the text field so that text and structured
/// output are not both present"), `content.text` is cleared; a failed
/// extraction leaves `content.text` untouched.
fn extract_and_clear_text(content: &mut AssistantContent) {
    let Some(text) = &content.text else { return };
    if let Ok(value) = response::extract_structured_output(text) {
        content.structured_output = Some(value);
        content.text = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemPromptSpec;

    #[test]
    fn agent_construction_succeeds_even_for_a_tool_incapable_provider() {
        // the deny-list check only fires once a caller actually attaches
        // tools, inside invoke() via AgentConfig::require_tools.
        let config = AgentConfig::new(vec!["ollama/llama3".to_string()], Vec::new()).unwrap();
        assert!(Agent::new(config).is_ok());
    }

    #[test]
    fn with_post_processors_runs_in_order() {
        let config = AgentConfig::new(vec!["ollama/llama3".to_string()], vec![SystemPromptSpec::Text("be nice".to_string())]).unwrap();
        let agent = Agent::new(config)
            .unwrap()
            .with_post_processors(vec![Box::new(|s| s.to_uppercase()), Box::new(|s| format!("{s}!"))]);
        assert_eq!(agent.apply_post_processors("hi".to_string()), "HI!");
    }

    #[test]
    fn successful_structured_output_extraction_clears_text() {
        let mut content = AssistantContent { text: Some(r#"{"action": "reply"}"#.to_string()), ..Default::default() };
        extract_and_clear_text(&mut content);
        assert!(content.text.is_none());
        assert_eq!(content.structured_output.unwrap()["action"], "reply");
    }

    #[test]
    fn failed_structured_output_extraction_leaves_text_untouched() {
        let mut content = AssistantContent { text: Some("just prose".to_string()), ..Default::default() };
        extract_and_clear_text(&mut content);
        assert_eq!(content.text.as_deref(), Some("just prose"));
        assert!(content.structured_output.is_none());
    }
}
