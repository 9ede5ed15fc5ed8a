pub mod ollama;
pub mod openai;

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use self::{ollama::OllamaChat, openai::OpenAiChat};

/// Provider used for model identifiers that carry no `provider/` prefix.
const DEFAULT_PROVIDER: &str = "openai";

/// Token accounting as reported by the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Raw output of a single chat round-trip.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// A chat-completion service for one provider.
///
/// `model` is the bare model name with the provider prefix already removed.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion>;
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub answer: String,
    pub usage: TokenUsage,
    pub latency: Duration,
}

/// Splits `provider/model-name` into its provider prefix and trailing model name.
pub fn split_model_id(model_id: &str) -> (&str, &str) {
    let model = model_id.rsplit('/').next().unwrap_or(model_id);
    let provider = model_id
        .split_once('/')
        .map_or(DEFAULT_PROVIDER, |(provider, _)| provider);
    (provider, model)
}

/// Routes single-turn prompts to the chat backend registered for each provider.
#[derive(Clone, Default)]
pub struct GenerationClient {
    backends: HashMap<String, Arc<dyn ChatBackend>>,
}

impl GenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_backend(mut self, provider: &str, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.insert(provider.to_string(), backend);
        self
    }

    /// Sends `prompt` as one user message to `model_id` and times the call.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is registered for the provider prefix or
    /// the backend call fails.
    pub async fn generate(&self, prompt: &str, model_id: &str) -> Result<GenerationResult> {
        let (provider, model) = split_model_id(model_id);
        let backend = self
            .backends
            .get(provider)
            .ok_or_else(|| anyhow!("no generation backend for provider '{provider}'"))?;

        debug!("Sending {} byte prompt to {model_id}", prompt.len());
        let start = Instant::now();
        let completion = backend.complete(model, prompt).await?;
        let latency = start.elapsed();

        info!(
            "Generation with {model_id} took {:.2}s (prompt={}, completion={}, total={})",
            latency.as_secs_f64(),
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens,
            completion.usage.total_tokens,
        );

        Ok(GenerationResult {
            answer: completion.text,
            usage: completion.usage,
            latency,
        })
    }
}
