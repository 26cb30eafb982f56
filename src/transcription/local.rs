//! Local Whisper transcription through the `whisper` command line.

use super::{Transcriber, Transcription};
use crate::device::ComputeDevice;
use crate::error::{KanhuError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs the openai-whisper CLI on the device picked at startup.
pub struct LocalWhisperTranscriber {
    command: String,
    model: String,
    device: ComputeDevice,
    language: Option<String>,
}

impl LocalWhisperTranscriber {
    pub fn new(command: &str, model: &str, device: ComputeDevice, language: Option<String>) -> Self {
        Self {
            command: command.to_string(),
            model: model.to_string(),
            device,
            language,
        }
    }

    fn args(&self, audio_path: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            audio_path.into(),
            "--model".into(),
            self.model.clone().into(),
            "--device".into(),
            self.device.as_str().into(),
            "--output_format".into(),
            "txt".into(),
            "--output_dir".into(),
            output_dir.into(),
            "--verbose".into(),
            "False".into(),
        ];
        if let Some(lang) = &self.language {
            args.push("--language".into());
            args.push(lang.clone().into());
        }
        // Half precision is unsupported on CPU and only produces a warning.
        if self.device == ComputeDevice::Cpu {
            args.push("--fp16".into());
            args.push("False".into());
        }
        args
    }
}

fn transcript_path(audio_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("audio"));
    let mut name = stem;
    name.push(".txt");
    output_dir.join(name)
}

#[async_trait]
impl Transcriber for LocalWhisperTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display(), device = %self.device))]
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
        let output_dir = tempfile::tempdir()?;

        let result = Command::new(&self.command)
            .args(self.args(audio_path, output_dir.path()))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KanhuError::ToolNotFound(self.command.clone()));
            }
            Err(e) => {
                return Err(KanhuError::ModelInference(format!("whisper execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KanhuError::ModelInference(format!("whisper failed: {}", stderr.trim())));
        }

        let text = tokio::fs::read_to_string(transcript_path(audio_path, output_dir.path()))
            .await
            .map_err(|e| KanhuError::ModelInference(format!("whisper produced no transcript: {e}")))?;

        let text = text.lines().map(str::trim).collect::<Vec<_>>().join(" ").trim().to_string();
        debug!("Transcribed {} chars", text.chars().count());

        Ok(Transcription {
            text,
            language: self.language.clone(),
        })
    }

    fn name(&self) -> String {
        format!("whisper-cli:{}@{}", self.model, self.device)
    }
}
