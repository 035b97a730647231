//! Provider router — selects the correct LLM provider based on config.
//!
//! Handles provider creation and picks native or prompted tool calling per
//! provider entry.

use std::collections::HashMap;
use std::sync::Arc;
use toolrelay_config::{AppConfig, ProviderConfig, ToolCallingMode};
use toolrelay_core::error::ProviderError;
use toolrelay_core::provider::Provider;
use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::prompted::PromptedProvider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build every configured provider, plus the default one if it is not
/// configured explicitly.
pub fn build_router(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        router.register(name.clone(), build_one(name, Some(provider_config), config));
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let name = config.default_provider.clone();
        router.register(name.clone(), build_one(&name, None, config));
    }

    router
}

/// The provider the orchestration loop should talk to.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    build_router(config).default().ok_or_else(|| {
        ProviderError::NotConfigured(format!(
            "default provider '{}' could not be built",
            config.default_provider
        ))
    })
}

fn build_one(name: &str, provider_config: Option<&ProviderConfig>, config: &AppConfig) -> Arc<dyn Provider> {
    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let api_url = provider_config.and_then(|p| p.api_url.clone());

    let native: Arc<dyn Provider> = match name {
        "anthropic" => {
            // Native Messages API, not the OpenAI-compatible proxy
            let mut p = AnthropicProvider::new(&api_key);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "ollama" => Arc::new(OpenAiCompatProvider::ollama(api_url.as_deref())),
        _ => {
            let base_url = api_url.unwrap_or_else(|| default_base_url(name));
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key))
        }
    };

    match provider_config.map(|p| p.tool_calling).unwrap_or_default() {
        ToolCallingMode::Native => native,
        ToolCallingMode::Prompted => Arc::new(PromptedProvider::new(native)),
    }
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
