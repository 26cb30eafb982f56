//! OpenAI speech API synthesis.

use super::Synthesizer;
use crate::error::{KanhuError, Result};
use crate::openai::create_client;
use async_openai::types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice};
use async_trait::async_trait;
use tracing::instrument;

pub struct OpenAiSynthesizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    voice: Voice,
}

impl OpenAiSynthesizer {
    pub fn new(voice: &str) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            voice: parse_voice(voice)?,
        })
    }
}

fn parse_voice(name: &str) -> Result<Voice> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        other => {
            return Err(KanhuError::Config(format!("Unknown speech voice: {}", other)));
        }
    })
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .voice(self.voice.clone())
            .model(SpeechModel::Tts1)
            .response_format(SpeechResponseFormat::Mp3)
            .build()
            .map_err(|e| KanhuError::ModelInference(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| KanhuError::ModelInference(format!("Speech API error: {}", e)))?;

        Ok(response.bytes.to_vec())
    }

    fn name(&self) -> String {
        format!("openai-tts:{:?}", self.voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voice() {
        assert!(matches!(parse_voice("Nova"), Ok(Voice::Nova)));
        assert!(matches!(parse_voice("robot"), Err(KanhuError::Config(_))));
    }
}
