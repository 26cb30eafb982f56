//! Request orchestration.
//!
//! Drives one exchange from upload or question through transcription,
//! retrieval, draft, refinement and optional speech synthesis. Answer-stage
//! failures degrade to the apology text; transcription failures and invalid
//! input are returned to the caller as [`StageError`]s.

use crate::audio::{AudioLifecycle, AudioUpload, SynthesizedAudio};
use crate::error::{KanhuError, Result};
use crate::exchange::{Exchange, Stage, StageError};
use crate::rag::{ContextBuilder, ContextChunk, RagEngine};
use crate::services::Services;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What `/record` should do with a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Return the transcription only.
    Transcribe,
    /// Transcribe, answer, and speak the answer.
    Voice,
}

impl FromStr for RecordMode {
    type Err = KanhuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "transcribe" => Ok(RecordMode::Transcribe),
            "voice" => Ok(RecordMode::Voice),
            other => Err(KanhuError::InvalidInput(format!("unknown mode: {}", other))),
        }
    }
}

/// Final answer of one exchange.
#[derive(Debug, Clone)]
pub struct AnswerArtifact {
    pub answer: String,
    /// True when an answer stage failed and `answer` is the apology text.
    pub degraded: bool,
    pub sources: Vec<ContextChunk>,
    pub audio: Option<SynthesizedAudio>,
}

impl AnswerArtifact {
    /// Format the answer for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!("\n{} (score: {:.2})", source.citation(), source.score));
            }
        }
        if let Some(audio) = &self.audio {
            output.push_str(&format!("\n\nAudio: {}", audio.path.display()));
        }

        output
    }
}

/// Result of a `/record` call.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub transcription: String,
    /// Present in voice mode.
    pub answer: Option<AnswerArtifact>,
}

/// The main orchestrator for the question/answer pipeline.
pub struct Orchestrator {
    services: Arc<Services>,
    engine: RagEngine,
    audio: AudioLifecycle,
}

impl Orchestrator {
    pub fn new(services: Arc<Services>) -> Self {
        let context_builder = ContextBuilder::new(
            services.index.clone(),
            services.embedder.clone(),
            services.pool.clone(),
        )
        .with_settings(&services.settings.retrieval);

        let engine = RagEngine::new(
            context_builder,
            services.drafter.clone(),
            services.refiner.clone(),
            services.pool.clone(),
        )
        .with_prompts(services.prompts.clone());

        let audio = AudioLifecycle::new(
            services.settings.temp_dir(),
            services.settings.audio_output_dir(),
            services.converter.clone(),
            services.transcriber.clone(),
            services.synthesizer.clone(),
            services.pool.clone(),
            services.transcription_pool(),
        );

        Self {
            services,
            engine,
            audio,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Transcribe a recording; in voice mode also answer and speak it.
    #[instrument(skip(self, upload), fields(mode = ?mode))]
    pub async fn transcribe_or_voice(
        &self,
        upload: AudioUpload,
        mode: RecordMode,
    ) -> std::result::Result<RecordOutcome, StageError> {
        let mut exchange = Exchange::new();
        exchange.advance(Stage::Transcribing);

        let transcription = self
            .audio
            .transcribe_upload(&upload)
            .await
            .map_err(|e| exchange.fail(e))?;
        exchange.advance(Stage::Transcribed);
        let text = transcription.text;

        match mode {
            RecordMode::Transcribe => {
                exchange.advance(Stage::Complete);
                Ok(RecordOutcome {
                    transcription: text,
                    answer: None,
                })
            }
            RecordMode::Voice => {
                if text.trim().is_empty() {
                    return Err(exchange.fail(KanhuError::AudioFormat(
                        "no speech recognized".to_string(),
                    )));
                }
                let answer = self.answer(&mut exchange, &text, true).await;
                Ok(RecordOutcome {
                    transcription: text,
                    answer: Some(answer),
                })
            }
        }
    }

    /// Answer a typed question, optionally with speech.
    #[instrument(skip(self, question), fields(voice = voice))]
    pub async fn submit(
        &self,
        question: &str,
        voice: bool,
    ) -> std::result::Result<AnswerArtifact, StageError> {
        let mut exchange = Exchange::new();
        let question = question.trim();
        if question.is_empty() {
            return Err(exchange.fail(KanhuError::InvalidInput("empty question".to_string())));
        }

        Ok(self.answer(&mut exchange, question, voice).await)
    }

    /// Open a previously synthesized answer for streaming.
    pub async fn fetch_audio(&self, filename: &str) -> Result<(tokio::fs::File, u64)> {
        self.audio.open_output(filename).await
    }

    async fn answer(&self, exchange: &mut Exchange, question: &str, voice: bool) -> AnswerArtifact {
        info!(exchange = %exchange.id(), "Answering question ({} chars)", question.chars().count());

        let (answer, sources, degraded) = match self.generate(exchange, question).await {
            Ok((answer, sources)) => (answer, sources, false),
            Err(e) => {
                warn!(exchange = %exchange.id(), stage = %e.stage, "Answer degraded: {}", e.source);
                (self.engine.fallback_answer().to_string(), Vec::new(), true)
            }
        };
        exchange.advance(Stage::Answered);

        let audio = if voice {
            exchange.advance(Stage::Synthesizing);
            match self.audio.synthesize(&answer).await {
                Ok(audio) => Some(audio),
                Err(e) => {
                    warn!(exchange = %exchange.id(), "Speech synthesis failed, omitting audio: {}", e);
                    None
                }
            }
        } else {
            None
        };
        exchange.advance(Stage::Complete);

        AnswerArtifact {
            answer,
            degraded,
            sources,
            audio,
        }
    }

    async fn generate(
        &self,
        exchange: &mut Exchange,
        question: &str,
    ) -> std::result::Result<(String, Vec<ContextChunk>), StageError> {
        exchange.advance(Stage::Retrieving);
        let context = self
            .engine
            .retrieve(question)
            .await
            .map_err(|e| StageError::new(exchange.stage(), e))?;

        exchange.advance(Stage::Drafting);
        let draft = self
            .engine
            .draft(question, &context)
            .await
            .map_err(|e| StageError::new(exchange.stage(), e))?;

        exchange.advance(Stage::Refining);
        let answer = self
            .engine
            .refine(question, &context, &draft)
            .await
            .map_err(|e| StageError::new(exchange.stage(), e))?;

        Ok((answer, context))
    }
}
