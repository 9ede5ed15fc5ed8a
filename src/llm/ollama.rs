use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};
use reqwest::Url;

use super::{ChatBackend, Completion, TokenUsage};

const DEFAULT_PORT: u16 = 11434;

/// Chat backend for models served by a local Ollama instance.
pub struct OllamaChat {
    client: Ollama,
}

impl OllamaChat {
    pub fn new(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("invalid Ollama URL: {url}"))?;
        let host = parsed
            .host_str()
            .with_context(|| format!("Ollama URL has no host: {url}"))?;
        let port = parsed.port().unwrap_or(DEFAULT_PORT);
        let client = Ollama::new(format!("{}://{host}", parsed.scheme()), port);
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatBackend for OllamaChat {
    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion> {
        let request =
            ChatMessageRequest::new(model.to_string(), vec![ChatMessage::user(prompt.to_string())]);
        let resp = self
            .client
            .send_chat_messages(request)
            .await
            .context("Problem with Ollama chat call")?;

        let usage = resp.final_data.map_or_else(TokenUsage::default, |data| {
            TokenUsage::new(
                u64::from(data.prompt_eval_count),
                u64::from(data.eval_count),
            )
        });

        Ok(Completion {
            text: resp.message.content,
            usage,
        })
    }
}
