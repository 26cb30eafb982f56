//! Embedding generation for semantic search and retrieval.

mod hashing;
mod ollama;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector, so a persisted index stays valid across restarts.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the underlying model, recorded in the persisted index.
    fn model_id(&self) -> String;
}

/// Create the embedder selected in settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    Ok(match settings.provider {
        EmbeddingProvider::Ollama => {
            Arc::new(OllamaEmbedder::new(&settings.base_url, &settings.model)?)
        }
        EmbeddingProvider::Hash => Arc::new(HashingEmbedder::new(settings.hash_dimensions)),
    })
}
