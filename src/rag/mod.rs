//! Two-stage answer chain: retrieval, local draft, cloud refinement.
//!
//! The draft grounds the refinement prompt and is never shown to the caller.

pub mod context;
mod engine;

pub use context::{format_context_for_display, format_context_for_prompt, ContextBuilder};
pub use engine::RagEngine;

use crate::vector_store::SearchResult;
use serde::Serialize;

/// A retrieved chunk prepared for prompting and citation.
#[derive(Debug, Clone, Serialize)]
pub struct ContextChunk {
    /// Source document ID.
    pub document_id: String,
    /// 1-based page in the source document.
    pub page: u32,
    /// Chunk text.
    pub content: String,
    /// Similarity score.
    pub score: f32,
}

impl ContextChunk {
    pub fn citation(&self) -> String {
        format!("{} p.{}", self.document_id, self.page)
    }
}

impl From<SearchResult> for ContextChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            document_id: result.chunk.document_id,
            page: result.chunk.page,
            content: result.chunk.text,
            score: result.score,
        }
    }
}
