//! Text-to-speech for spoken answers.

mod google;
mod openai;

pub use google::GoogleTranslateSynthesizer;
pub use openai::OpenAiSynthesizer;

use crate::config::{SynthesisProvider, SynthesisSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces MP3 audio for a text.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` and return the encoded MP3 bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    fn name(&self) -> String;
}

/// Create the synthesizer selected in settings.
pub fn create_synthesizer(settings: &SynthesisSettings) -> Result<Arc<dyn Synthesizer>> {
    Ok(match settings.provider {
        SynthesisProvider::Google => Arc::new(GoogleTranslateSynthesizer::new(&settings.language)),
        SynthesisProvider::Openai => Arc::new(OpenAiSynthesizer::new(&settings.voice)?),
    })
}
