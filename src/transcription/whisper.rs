//! OpenAI Whisper API transcription.

use super::{Transcriber, Transcription};
use crate::error::{KanhuError, Result};
use crate::openai::create_client;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

/// Hosted Whisper transcriber (reads `OPENAI_API_KEY`).
pub struct WhisperApiTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
}

impl WhisperApiTranscriber {
    pub fn new(model: &str, language: Option<String>) -> Result<Self> {
        // The local default model name is not valid for the API.
        let model = if model == "base" { "whisper-1" } else { model };

        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            language,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.wav")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| KanhuError::ModelInference(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| KanhuError::ModelInference(format!("Whisper API error: {}", e)))?;

        debug!("Whisper API detected language {}", response.language);
        Ok(Transcription {
            text: response.text.trim().to_string(),
            language: Some(response.language),
        })
    }

    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }
}
