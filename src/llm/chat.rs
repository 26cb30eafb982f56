//! Cloud refinement model over the OpenAI chat-completions protocol.

use super::TextGenerator;
use crate::config::RefineSettings;
use crate::error::{KanhuError, Result};
use crate::openai::create_compatible_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat model behind any OpenAI-compatible endpoint (Gemini by default).
pub struct ChatCompletionGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl ChatCompletionGenerator {
    /// Build from settings. Fails when the API key variable is unset.
    pub fn from_settings(settings: &RefineSettings, timeout: Duration) -> Result<Self> {
        let api_key = settings.api_key().ok_or_else(|| {
            KanhuError::Config(format!(
                "{} is not set; the refinement model needs an API key",
                settings.api_key_env
            ))
        })?;

        Ok(Self {
            client: create_compatible_client(&settings.api_base, &api_key, timeout)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    #[instrument(skip(self, system, prompt), fields(model = %self.model))]
    async fn generate(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let build_err = |e: async_openai::error::OpenAIError| KanhuError::ModelInference(e.to_string());

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.to_string())
                    .build()
                    .map_err(build_err)?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(build_err)?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(build_err)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            KanhuError::ModelInference(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| KanhuError::ModelInference("Empty response from LLM".to_string()))?;

        debug!("Refinement returned {} chars", answer.len());
        Ok(answer)
    }

    fn name(&self) -> String {
        self.model.clone()
    }
}
