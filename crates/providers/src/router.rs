//! Provider router: selects the correct model provider based on config.

use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use rolerag_core::error::ProviderError;
use rolerag_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds the configured providers and hands out the default one.
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

    /// The default provider, or `NotConfigured`.
    pub fn require_default(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.default()
            .ok_or_else(|| ProviderError::NotConfigured(self.default_provider.clone()))
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the router from configuration.
pub fn build_from_config(config: &rolerag_config::AppConfig) -> Result<ProviderRouter, ProviderError> {
    let p = &config.provider;
    let mut router = ProviderRouter::new(&p.kind);

    let provider: Arc<dyn Provider> = if p.kind == "ollama" {
        Arc::new(OllamaProvider::new(p.base_url.as_deref(), p.timeout_secs)?)
    } else {
        let base_url = p.base_url.clone().unwrap_or_else(|| default_base_url(&p.kind));
        let api_key = p.api_key.clone().unwrap_or_default();
        Arc::new(OpenAiCompatProvider::new(&p.kind, base_url, api_key, p.timeout_secs)?)
    };
    router.register(p.kind.clone(), provider);

    Ok(router)
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama-openai" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "http://localhost:8000/v1".into(),
    }
}
