//! Local draft model served by Ollama.

use super::TextGenerator;
use crate::error::{KanhuError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Chat model on a local Ollama server (non-streaming).
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("api/chat"))
            .map_err(|e| KanhuError::Config(format!("Invalid Ollama URL {}: {}", base_url, e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    #[instrument(skip(self, system, prompt), fields(model = %self.model))]
    async fn generate(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| KanhuError::ModelInference(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KanhuError::ModelInference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed.message.content.trim().to_string();
        if text.is_empty() {
            return Err(KanhuError::ModelInference(
                "Empty response from draft model".to_string(),
            ));
        }

        debug!("Draft model returned {} chars", text.len());
        Ok(text)
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
