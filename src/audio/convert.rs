//! Audio normalization with ffmpeg.

use crate::error::{KanhuError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Converts uploads to 16 kHz mono PCM WAV, the input Whisper expects.
#[derive(Debug, Clone)]
pub struct AudioConverter {
    ffmpeg: String,
}

impl AudioConverter {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.ffmpeg
    }

    /// Convert `source` into a WAV file at `dest`.
    pub async fn to_wav(&self, source: &Path, dest: &Path) -> Result<()> {
        debug!("Converting {:?} to WAV", source);

        let result = Command::new(&self.ffmpeg)
            .arg("-i").arg(source)
            .arg("-vn")
            .arg("-ac").arg("1")
            .arg("-ar").arg("16000")
            .arg("-c:a").arg("pcm_s16le")
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(KanhuError::AudioFormat(format!("ffmpeg conversion failed: {}", err.trim())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KanhuError::ToolNotFound(self.ffmpeg.clone()))
            }
            Err(e) => Err(KanhuError::AudioFormat(format!("ffmpeg error: {e}"))),
        }
    }
}
