//! Text generation backends.
//!
//! The local draft model and the cloud refinement model share one trait so the
//! answer chain can be exercised with deterministic doubles.

mod chat;
mod ollama;

pub use chat::ChatCompletionGenerator;
pub use ollama::OllamaGenerator;

use crate::error::{KanhuError, Result};
use async_trait::async_trait;

/// A single-shot instruction-following model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`, optionally preceded by a system message.
    async fn generate(&self, system: Option<&str>, prompt: &str) -> Result<String>;

    /// Model name for logs and diagnostics.
    fn name(&self) -> String;
}

/// Stands in for a model that could not be configured; every call fails.
pub struct UnavailableGenerator {
    name: String,
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    async fn generate(&self, _system: Option<&str>, _prompt: &str) -> Result<String> {
        Err(KanhuError::ModelInference(format!("{} unavailable: {}", self.name, self.reason)))
    }

    fn name(&self) -> String {
        format!("{} (unavailable)", self.name)
    }
}
