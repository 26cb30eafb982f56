//! In-memory vector index.
//!
//! Built once per corpus fingerprint and never mutated afterwards, so it can be
//! shared behind an `Arc` and searched concurrently without locking.

use super::{cosine_similarity, mmr_select, SearchResult};
use crate::chunking::DocumentChunk;
use crate::error::{KanhuError, Result};
use serde::{Deserialize, Serialize};

/// A chunk together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Immutable flat vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Embedding model the vectors came from.
    embedder: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from chunks and their embeddings (same order).
    pub fn build(
        embedder: impl Into<String>,
        chunks: Vec<DocumentChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(KanhuError::InvalidInput(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = embeddings.iter().position(|e| e.len() != dimensions) {
            return Err(KanhuError::InvalidInput(format!(
                "embedding {} has {} dimensions, expected {}",
                bad,
                embeddings[bad].len(),
                dimensions
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Ok(Self {
            embedder: embedder.into(),
            dimensions,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The `fetch_k` entries most similar to the query, best first.
    pub fn nearest(&self, query: &[f32], fetch_k: usize) -> Vec<SearchResult> {
        self.nearest_indices(query, fetch_k)
            .into_iter()
            .map(|(i, score)| self.result(i, score))
            .collect()
    }

    /// Diversity-aware search: take the `fetch_k` nearest candidates, then
    /// select `k` of them with maximal marginal relevance.
    pub fn search(&self, query: &[f32], k: usize, fetch_k: usize, lambda: f32) -> Vec<SearchResult> {
        let candidates = self.nearest_indices(query, fetch_k.max(k));
        let ids: Vec<usize> = candidates.iter().map(|(i, _)| *i).collect();
        let embeddings: Vec<&[f32]> = self.entries.iter().map(|e| e.embedding.as_slice()).collect();

        mmr_select(query, &ids, &embeddings, k, lambda)
            .into_iter()
            .map(|i| {
                let score = candidates
                    .iter()
                    .find(|(c, _)| *c == i)
                    .map(|(_, s)| *s)
                    .unwrap_or_default();
                self.result(i, score)
            })
            .collect()
    }

    fn nearest_indices(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    fn result(&self, i: usize, score: f32) -> SearchResult {
        SearchResult {
            chunk: self.entries[i].chunk.clone(),
            score,
        }
    }
}
