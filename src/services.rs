//! Service context shared by every request.
//!
//! Built once at startup: device probe, model clients, and the
//! fingerprint-checked index. Handlers receive it through axum state.

use crate::audio::AudioConverter;
use crate::config::{Prompts, Settings, TranscriptionProvider};
use crate::device::{probe_device, ComputeDevice};
use crate::embedding::{create_embedder, Embedder};
use crate::error::Result;
use crate::index::{Fingerprint, IndexManager, IndexStatus};
use crate::llm::{ChatCompletionGenerator, OllamaGenerator, TextGenerator, UnavailableGenerator};
use crate::synthesis::{create_synthesizer, Synthesizer};
use crate::transcription::{create_transcriber, Transcriber};
use crate::vector_store::VectorIndex;
use crate::worker::InferencePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Long-lived components injected into the orchestrator.
pub struct Services {
    pub settings: Settings,
    pub prompts: Prompts,
    pub index: Arc<VectorIndex>,
    pub fingerprint: Fingerprint,
    pub index_status: IndexStatus,
    pub embedder: Arc<dyn Embedder>,
    pub drafter: Arc<dyn TextGenerator>,
    pub refiner: Arc<dyn TextGenerator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub converter: AudioConverter,
    pub pool: InferencePool,
    pub device: ComputeDevice,
}

/// Options for [`Services::initialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StartupOptions {
    /// Rebuild the index even if the fingerprint matches.
    pub force_rebuild: bool,
    /// Show progress bars while embedding.
    pub progress: bool,
}

impl Services {
    /// Run the startup sequence. The index is ready when this returns.
    pub async fn initialize(settings: Settings, options: StartupOptions) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let pool = InferencePool::new(settings.pool.max_concurrent, settings.pool.timeout());

        let device = match settings.transcription.provider {
            TranscriptionProvider::Local => probe_device(),
            TranscriptionProvider::Openai => ComputeDevice::Cpu,
        };

        let embedder = create_embedder(&settings.embedding)?;
        let outcome = IndexManager::new(&settings, embedder.clone(), pool.clone())
            .with_progress(options.progress)
            .open(options.force_rebuild)
            .await?;
        info!(
            "Index ready: {} chunks, fingerprint {}",
            outcome.index.len(),
            outcome.fingerprint.short()
        );

        let drafter: Arc<dyn TextGenerator> = Arc::new(OllamaGenerator::new(
            &settings.draft.base_url,
            &settings.draft.model,
        )?);

        let refiner: Arc<dyn TextGenerator> =
            match ChatCompletionGenerator::from_settings(&settings.refine, settings.pool.timeout()) {
                Ok(generator) => Arc::new(generator),
                Err(e) => {
                    warn!("Refinement model not configured, answers will fall back: {}", e);
                    Arc::new(UnavailableGenerator::new(&settings.refine.model, e.to_string()))
                }
            };

        let transcriber = create_transcriber(&settings.transcription, device)?;
        let synthesizer = create_synthesizer(&settings.synthesis)?;
        let converter = AudioConverter::new(settings.transcription.ffmpeg_command.clone());

        Ok(Self {
            settings,
            prompts,
            index: outcome.index,
            fingerprint: outcome.fingerprint,
            index_status: outcome.status,
            embedder,
            drafter,
            refiner,
            transcriber,
            synthesizer,
            converter,
            pool,
            device,
        })
    }

    /// Pool handle for transcription, which gets its own deadline.
    pub fn transcription_pool(&self) -> InferencePool {
        self.pool
            .with_timeout(Duration::from_secs(self.settings.transcription.timeout_seconds))
    }
}
