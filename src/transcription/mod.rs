//! Speech-to-text.
//!
//! Two providers: the local Whisper command line on the probed compute device
//! (default) and the OpenAI Whisper API.

mod local;
mod whisper;

pub use local::LocalWhisperTranscriber;
pub use whisper::WhisperApiTranscriber;

use crate::config::{TranscriptionProvider, TranscriptionSettings};
use crate::device::ComputeDevice;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Recognized text for one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcription {
    pub text: String,
    /// Language reported by the model, when available.
    pub language: Option<String>,
}

impl Transcription {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
        }
    }
}

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file.
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription>;

    /// Provider and model, for logs and diagnostics.
    fn name(&self) -> String;
}

/// Create the transcriber selected in settings.
pub fn create_transcriber(
    settings: &TranscriptionSettings,
    device: ComputeDevice,
) -> Result<Arc<dyn Transcriber>> {
    Ok(match settings.provider {
        TranscriptionProvider::Local => Arc::new(LocalWhisperTranscriber::new(
            &settings.whisper_command,
            &settings.model,
            device,
            settings.language.clone(),
        )),
        TranscriptionProvider::Openai => Arc::new(WhisperApiTranscriber::new(
            &settings.model,
            settings.language.clone(),
        )?),
    })
}
