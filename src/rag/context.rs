//! Context retrieval for the answer chain.

use super::ContextChunk;
use crate::config::RetrievalSettings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::VectorIndex;
use crate::worker::InferencePool;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Embeds a question and pulls diverse supporting chunks from the index.
pub struct ContextBuilder {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    pool: InferencePool,
    k: usize,
    fetch_k: usize,
    lambda: f32,
}

impl ContextBuilder {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, pool: InferencePool) -> Self {
        let defaults = RetrievalSettings::default();
        Self {
            index,
            embedder,
            pool,
            k: defaults.k,
            fetch_k: defaults.fetch_k,
            lambda: defaults.lambda,
        }
    }

    /// Apply retrieval settings (k, fetch_k, lambda).
    pub fn with_settings(mut self, settings: &RetrievalSettings) -> Self {
        self.k = settings.k.max(1);
        self.fetch_k = settings.fetch_k.max(self.k);
        self.lambda = settings.lambda;
        self
    }

    /// Set the number of chunks handed to the models.
    pub fn with_max_chunks(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self.fetch_k = self.fetch_k.max(self.k);
        self
    }

    /// Build context for a query: `fetch_k` nearest, then `k` by diversity.
    #[instrument(skip(self, query), fields(k = self.k, fetch_k = self.fetch_k))]
    pub async fn build(&self, query: &str) -> Result<Vec<ContextChunk>> {
        let embedding = self.embed(query).await?;

        let index = self.index.clone();
        let (k, fetch_k, lambda) = (self.k, self.fetch_k, self.lambda);
        let results = self
            .pool
            .run_blocking("search", move || Ok(index.search(&embedding, k, fetch_k, lambda)))
            .await?;

        debug!("Retrieved {} context chunks", results.len());
        Ok(results.into_iter().map(ContextChunk::from).collect())
    }

    /// The `fetch_k` nearest chunks before diversity selection, best first.
    pub async fn candidates(&self, query: &str) -> Result<Vec<ContextChunk>> {
        let embedding = self.embed(query).await?;
        let index = self.index.clone();
        let fetch_k = self.fetch_k;
        let results = self
            .pool
            .run_blocking("search", move || Ok(index.nearest(&embedding, fetch_k)))
            .await?;
        Ok(results.into_iter().map(ContextChunk::from).collect())
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        self.pool.run("embed", self.embedder.embed(query)).await
    }
}

/// Format context chunks for inclusion in a prompt.
pub fn format_context_for_prompt(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "---\n[{}] {}\n{}\n---",
                i + 1,
                chunk.citation(),
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format context chunks as a source list for terminal output.
pub fn format_context_for_display(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("{} (score: {:.2})", chunk.citation(), chunk.score))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk_documents, RecursiveCharacterSplitter};
    use crate::corpus::{SourceDocument, SourcePage};
    use crate::embedding::HashingEmbedder;
    use std::path::PathBuf;
    use std::time::Duration;

    const ANSWER: &str = "Normal fasting blood sugar is 70 to 99 mg/dL.";

    async fn builder() -> ContextBuilder {
        let filler: Vec<String> = [
            "Take blood pressure readings after five minutes of rest.",
            "Keep a written log of every medication dose.",
            "Encourage short walks after meals when possible.",
            "Call the clinic if swelling in the ankles increases.",
            "Store insulin in the refrigerator but never freeze it.",
            "Offer water often because thirst sensation declines with age.",
            "Check feet daily for cuts or blisters.",
            "Use a pill organizer labelled with days of the week.",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut texts = filler;
        texts.insert(3, ANSWER.to_string());
        let doc = SourceDocument {
            id: "guide.pdf".to_string(),
            path: PathBuf::from("guide.pdf"),
            pages: texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| SourcePage::new(i as u32 + 1, text))
                .collect(),
        };

        let splitter = RecursiveCharacterSplitter::new(600, 150);
        let chunks = chunk_documents(&splitter, &[doc]);
        let embedder = Arc::new(HashingEmbedder::new(384));
        let embeddings = chunks.iter().map(|c| embedder.embed_sync(&c.text)).collect();
        let index = VectorIndex::build("hash:384", chunks, embeddings).unwrap();

        ContextBuilder::new(
            Arc::new(index),
            embedder,
            InferencePool::new(2, Duration::from_secs(5)),
        )
        .with_max_chunks(3)
    }

    #[tokio::test]
    async fn test_verbatim_answer_is_a_candidate() {
        let builder = builder().await;
        let candidates = builder
            .candidates("What is the normal fasting blood sugar range?")
            .await
            .unwrap();
        assert!(candidates.iter().any(|c| c.content == ANSWER));
    }

    #[tokio::test]
    async fn test_build_returns_k_chunks_with_answer_first() {
        let builder = builder().await;
        let context = builder
            .build("What is the normal fasting blood sugar range?")
            .await
            .unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[0].content, ANSWER);
        assert_eq!(context[0].citation(), "guide.pdf p.4");
    }

    #[test]
    fn test_format_context_for_prompt() {
        let chunks = vec![ContextChunk {
            document_id: "guide.pdf".to_string(),
            page: 2,
            content: "Drink water.".to_string(),
            score: 0.5,
        }];
        assert_eq!(
            format_context_for_prompt(&chunks),
            "---\n[1] guide.pdf p.2\nDrink water.\n---"
        );
        assert_eq!(format_context_for_display(&chunks), "guide.pdf p.2 (score: 0.50)");
    }
}
