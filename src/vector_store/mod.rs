//! Vector index over corpus chunks.
//!
//! A flat in-memory index: exact cosine search over every entry, followed by
//! maximal-marginal-relevance selection to keep near-duplicate chunks from
//! crowding out the rest of the context.

mod memory;
mod mmr;

pub use memory::{IndexEntry, VectorIndex};
pub use mmr::mmr_select;

use crate::chunking::DocumentChunk;

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query (higher is better).
    pub score: f32,
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
