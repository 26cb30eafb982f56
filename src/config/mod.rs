//! Configuration module for Kanhu.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{DraftPrompts, Prompts, RefinePrompts};
pub use settings::{
    CorpusSettings, DraftSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings,
    IndexSettings, PoolSettings, PromptSettings, RefineSettings, RetrievalSettings,
    ServerSettings, Settings, SynthesisProvider, SynthesisSettings, TranscriptionProvider,
    TranscriptionSettings,
};
