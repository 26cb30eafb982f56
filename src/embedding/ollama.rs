//! Ollama embeddings implementation.

use super::Embedder;
use crate::error::{KanhuError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Embedder backed by a local Ollama server.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create an embedder for `model` served at `base_url`.
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("api/embeddings"))
            .map_err(|e| KanhuError::Config(format!("Invalid Ollama URL {}: {}", base_url, e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| KanhuError::ModelInference(format!("Ollama embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KanhuError::ModelInference(format!(
                "Ollama embedding returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.embedding.is_empty() {
            return Err(KanhuError::ModelInference(
                "Empty embedding response".to_string(),
            ));
        }

        debug!("Embedding has {} dimensions", parsed.embedding.len());
        Ok(parsed.embedding)
    }

    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
