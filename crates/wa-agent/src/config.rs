//! Agent configuration: which provider(s) to call, in what order, which
//! system prompts to prepend, and how many tokens to allow per call.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AgentError, AgentResult};

/// A provider registry entry: where to send the request, which environment
/// variable carries the API key, and whether that provider's API accepts
/// `tools`/`tool_choice` at all. A handful of hosted inference endpoints
/// (bare completion proxies, some self-hosted runners) only speak plain
/// chat completions and silently ignore `tools` — better to refuse up
/// front than to construct a request whose tool calls never come back.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub key: &'static str,
    pub base_url: &'static str,
    pub api_key_env: Option<&'static str>,
    pub supports_tools: bool,
}

const PROVIDER_REGISTRY: &[ProviderProfile] = &[
    ProviderProfile {
        key: "openai",
        base_url: "https://api.openai.com/v1/chat/completions",
        api_key_env: Some("OPENAI_API_KEY"),
        supports_tools: true,
    },
    ProviderProfile {
        key: "openrouter",
        base_url: "https://openrouter.ai/api/v1/chat/completions",
        api_key_env: Some("OPENROUTER_API_KEY"),
        supports_tools: true,
    },
    ProviderProfile {
        key: "together",
        base_url: "https://api.together.xyz/v1/chat/completions",
        api_key_env: Some("TOGETHER_API_KEY"),
        supports_tools: true,
    },
    ProviderProfile {
        key: "groq",
        base_url: "https://api.groq.com/openai/v1/chat/completions",
        api_key_env: Some("GROQ_API_KEY"),
        supports_tools: true,
    },
    // Deny-listed: this endpoint accepts the OpenAI wire format for plain
    // completions but has no function-calling support. Kept in the
    // registry (rather than just undocumented) so attaching tools to it
    // fails with a clear error instead of a silently ignored request.
    ProviderProfile {
        key: "ollama",
        base_url: "http://localhost:11434/v1/chat/completions",
        api_key_env: None,
        supports_tools: false,
    },
];

pub fn lookup_provider(key: &str) -> AgentResult<&'static ProviderProfile> {
    PROVIDER_REGISTRY
        .iter()
        .find(|p| p.key == key)
        .ok_or_else(|| AgentError::UnknownProvider(key.to_string()))
}

/// One entry of the `api/model` pattern: `<provider_key>/<model>`, e.g.
/// `openrouter/anthropic/claude-3.5-sonnet` (the model itself may contain
/// further `/`s; only the first segment is the provider key).
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub provider_key: String,
    pub model: String,
}

impl ProviderSpec {
    pub fn parse(spec: &str) -> AgentResult<Self> {
        let (provider_key, model) = spec
            .split_once('/')
            .ok_or_else(|| AgentError::InvalidProviderSpec(spec.to_string()))?;
        if provider_key.is_empty() || model.is_empty() {
            return Err(AgentError::InvalidProviderSpec(spec.to_string()));
        }
        Ok(Self { provider_key: provider_key.to_string(), model: model.to_string() })
    }
}

/// A system prompt source: either inline text, or a file on disk with
/// `{{placeholder}}` substitution applied after reading it. Multiple
/// sources are concatenated, in order, separated by a blank line.
#[derive(Debug, Clone)]
pub enum SystemPromptSpec {
    Text(String),
    File { path: PathBuf, replace: HashMap<String, String> },
}

impl SystemPromptSpec {
    pub fn load(&self) -> AgentResult<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::File { path, replace } => {
                let mut contents = std::fs::read_to_string(path).map_err(|e| {
                    AgentError::Response { provider: "config".to_string(), message: format!("reading system prompt {}: {e}", path.display()) }
                })?;
                for (key, value) in replace {
                    contents = contents.replace(&format!("{{{{{key}}}}}"), value);
                }
                Ok(contents)
            }
        }
    }
}

/// Renders every [`SystemPromptSpec`] and concatenates the results,
/// separated by a blank line, matching the ordering the caller supplied.
pub fn concat_system_prompts(specs: &[SystemPromptSpec]) -> AgentResult<Option<String>> {
    let mut rendered = Vec::with_capacity(specs.len());
    for spec in specs {
        let text = spec.load()?;
        if !text.trim().is_empty() {
            rendered.push(text);
        }
    }
    if rendered.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rendered.join("\n\n")))
    }
}

/// Full agent configuration: the primary provider/model actually invoked,
/// an optional ordered list of fallback models attached to the request for
/// a *routed* provider (e.g. OpenRouter's `models` array) to fall over
/// between internally, the concatenated system prompt, and the max-tokens
/// cap applied to every call.
///
/// Per spec.md §4.6/§7: fallback is a routing concern handled by the
/// provider's own infrastructure once a request is in flight — this agent
/// never re-dispatches a failed call to a different provider itself.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub primary: ProviderSpec,
    pub fallback_models: Vec<String>,
    pub system_prompts: Vec<SystemPromptSpec>,
    pub max_tokens: Option<u64>,
    pub temperature: f32,
}

impl AgentConfig {
    /// `api_models` is one or more `provider/model` strings: a single entry
    /// selects one provider outright; additional entries describe a routed
    /// provider's ordered fallback chain and must share the first entry's
    /// provider key (the agent only ever dials one HTTP endpoint — the
    /// fallback models ride along as request metadata for that endpoint to
    /// act on). Fails fast if any entry names an unknown provider, or if
    /// the chain mixes provider keys.
    pub fn new(api_models: Vec<String>, system_prompts: Vec<SystemPromptSpec>) -> AgentResult<Self> {
        if api_models.is_empty() {
            return Err(AgentError::InvalidProviderSpec("at least one provider/model entry is required".to_string()));
        }
        let specs = api_models.iter().map(|s| ProviderSpec::parse(s)).collect::<AgentResult<Vec<_>>>()?;
        let primary = specs[0].clone();
        lookup_provider(&primary.provider_key)?;

        let mut fallback_models = Vec::with_capacity(specs.len() - 1);
        for spec in &specs[1..] {
            if spec.provider_key != primary.provider_key {
                return Err(AgentError::InvalidProviderSpec(format!(
                    "fallback chain mixes provider keys: {} vs {}",
                    primary.provider_key, spec.provider_key
                )));
            }
            fallback_models.push(spec.model.clone());
        }

        Ok(Self { primary, fallback_models, system_prompts, max_tokens: None, temperature: 0.2 })
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Verifies the primary provider accepts tool schemas. Called once at
    /// agent construction when the caller intends to pass tools, so a
    /// deny-listed provider fails before any network call.
    pub fn require_tools(&self) -> AgentResult<()> {
        let profile = lookup_provider(&self.primary.provider_key)?;
        if !profile.supports_tools {
            return Err(AgentError::ToolsNotSupported(self.primary.provider_key.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_model() {
        let spec = ProviderSpec::parse("openrouter/anthropic/claude-3.5-sonnet").unwrap();
        assert_eq!(spec.provider_key, "openrouter");
        assert_eq!(spec.model, "anthropic/claude-3.5-sonnet");
    }

    #[test]
    fn rejects_spec_without_slash() {
        assert!(ProviderSpec::parse("openrouter").is_err());
    }

    #[test]
    fn require_tools_rejects_deny_listed_provider() {
        let config = AgentConfig::new(vec!["ollama/llama3".to_string()], Vec::new()).unwrap();
        assert!(matches!(config.require_tools(), Err(AgentError::ToolsNotSupported(_))));
    }

    #[test]
    fn multi_entry_chain_becomes_primary_plus_fallback_models() {
        let config = AgentConfig::new(
            vec!["openrouter/anthropic/claude-3.5-sonnet".to_string(), "openrouter/openai/gpt-4o-mini".to_string()],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(config.primary.model, "anthropic/claude-3.5-sonnet");
        assert_eq!(config.fallback_models, vec!["openai/gpt-4o-mini".to_string()]);
    }

    #[test]
    fn fallback_chain_rejects_mixed_provider_keys() {
        let err = AgentConfig::new(vec!["openrouter/modelA".to_string(), "groq/modelB".to_string()], Vec::new()).unwrap_err();
        assert!(matches!(err, AgentError::InvalidProviderSpec(_)));
    }

    #[test]
    fn concat_system_prompts_joins_with_blank_line() {
        let specs = vec![SystemPromptSpec::Text("a".to_string()), SystemPromptSpec::Text("b".to_string())];
        assert_eq!(concat_system_prompts(&specs).unwrap(), Some("a\n\nb".to_string()));
    }

    #[test]
    fn concat_system_prompts_empty_yields_none() {
        assert_eq!(concat_system_prompts(&[]).unwrap(), None);
    }
}
