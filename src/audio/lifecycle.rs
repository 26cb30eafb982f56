//! Per-request audio files.
//!
//! Uploaded recordings and their converted counterparts live in the temp
//! directory only for the duration of one transcription. Synthesized answers
//! are written to the output directory and kept for `/audio/<filename>`.

use super::AudioConverter;
use crate::error::{KanhuError, Result};
use crate::synthesis::Synthesizer;
use crate::transcription::{Transcriber, Transcription};
use crate::worker::InferencePool;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Audio received from a client.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    /// Client-side file name, used only for its extension.
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    pub fn new(file_name: Option<String>, bytes: Vec<u8>) -> Self {
        Self { file_name, bytes }
    }

    /// Sanitized extension including the dot, or empty.
    fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// A synthesized answer on disk.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedAudio {
    pub filename: String,
    /// Relative URL served by the `/audio/<filename>` route.
    pub url: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// The recording and converted file of one request.
///
/// Files are removed by [`RecordingSession::cleanup`], or on drop if the
/// request was cancelled before cleanup ran.
#[derive(Debug)]
pub struct RecordingSession {
    id: Uuid,
    raw: PathBuf,
    converted: PathBuf,
    cleaned: bool,
}

impl RecordingSession {
    /// Write the upload to `recording_<uuid><ext>` in `temp_dir`.
    pub async fn create(temp_dir: &Path, upload: &AudioUpload) -> Result<Self> {
        tokio::fs::create_dir_all(temp_dir).await?;

        let id = Uuid::new_v4();
        let session = Self {
            id,
            raw: temp_dir.join(format!("recording_{}{}", id, upload.extension())),
            converted: temp_dir.join(format!("converted_{}.wav", id)),
            cleaned: false,
        };
        tokio::fs::write(&session.raw, &upload.bytes).await?;
        debug!("Saved recording {} ({} bytes)", session.raw.display(), upload.bytes.len());
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw
    }

    pub fn converted_path(&self) -> &Path {
        &self.converted
    }

    /// Delete both files. Errors are logged, never returned.
    pub async fn cleanup(mut self) {
        for path in [&self.raw, &self.converted] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }
        self.cleaned = true;
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        for path in [&self.raw, &self.converted] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Owns the speech pipeline's files and model calls.
pub struct AudioLifecycle {
    temp_dir: PathBuf,
    output_dir: PathBuf,
    converter: AudioConverter,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    /// Pool handle carrying the transcription deadline.
    stt_pool: InferencePool,
    pool: InferencePool,
}

impl AudioLifecycle {
    pub fn new(
        temp_dir: PathBuf,
        output_dir: PathBuf,
        converter: AudioConverter,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        pool: InferencePool,
        stt_pool: InferencePool,
    ) -> Self {
        Self {
            temp_dir,
            output_dir,
            converter,
            transcriber,
            synthesizer,
            stt_pool,
            pool,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save, normalize and transcribe an upload, then delete its temp files.
    ///
    /// If normalization fails the raw upload is transcribed instead.
    #[instrument(skip(self, upload), fields(bytes = upload.bytes.len()))]
    pub async fn transcribe_upload(&self, upload: &AudioUpload) -> Result<Transcription> {
        if upload.bytes.is_empty() {
            return Err(KanhuError::AudioFormat("uploaded audio is empty".to_string()));
        }

        let session = RecordingSession::create(&self.temp_dir, upload).await?;
        let result = self.transcribe_session(&session).await;
        session.cleanup().await;
        result
    }

    async fn transcribe_session(&self, session: &RecordingSession) -> Result<Transcription> {
        let conversion = self
            .converter
            .to_wav(session.raw_path(), session.converted_path())
            .await;

        let (path, conversion_error) = match conversion {
            Ok(()) => (session.converted_path(), None),
            Err(e) => {
                warn!("Audio conversion failed, transcribing raw upload: {}", e);
                (session.raw_path(), Some(e))
            }
        };

        let result = self
            .stt_pool
            .run("transcribe", self.transcriber.transcribe(path))
            .await;

        match (result, conversion_error) {
            (Ok(t), _) => {
                info!("Transcribed {} chars", t.text.chars().count());
                Ok(t)
            }
            (Err(e), Some(conversion)) => Err(KanhuError::AudioFormat(format!(
                "{}; raw upload could not be transcribed either: {}",
                conversion, e
            ))),
            (Err(e), None) => Err(e),
        }
    }

    /// Synthesize speech into `response_<uuid>.mp3` in the output directory.
    #[instrument(skip(self, text))]
    pub async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let bytes = self
            .pool
            .run("synthesize", self.synthesizer.synthesize(text))
            .await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let filename = format!("response_{}.mp3", Uuid::new_v4());
        let path = self.output_dir.join(&filename);
        tokio::fs::write(&path, &bytes).await?;

        info!("Wrote {} ({} bytes)", filename, bytes.len());
        Ok(SynthesizedAudio {
            url: format!("/audio/{}", filename),
            filename,
            path,
        })
    }

    /// Resolve a synthesized file by name, rejecting anything outside the output directory.
    pub fn resolve_output(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        let path = self.output_dir.join(filename);
        if !path.is_file() {
            return Err(KanhuError::NotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Open a synthesized file for streaming; returns the handle and its length.
    pub async fn open_output(&self, filename: &str) -> Result<(tokio::fs::File, u64)> {
        let path = self.resolve_output(filename)?;
        let file = tokio::fs::File::open(&path).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    let invalid = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\', '\0'])
        || filename.contains("..");
    if invalid {
        return Err(KanhuError::InvalidInput(format!("invalid audio filename: {}", filename)));
    }
    Ok(())
}
