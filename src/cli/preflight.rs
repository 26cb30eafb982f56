//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and directories are available before
//! starting an index build or the server.

use crate::config::{Settings, TranscriptionProvider};
use crate::error::{KanhuError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Serving needs the corpus and the audio tools.
    Serve,
    /// Indexing and asking need the corpus.
    Index,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_corpus_dir(settings)?;

    if let Operation::Serve = operation {
        check_tool(&settings.transcription.ffmpeg_command, "-version")?;
        if settings.transcription.provider == TranscriptionProvider::Local {
            check_tool(&settings.transcription.whisper_command, "--help")?;
        }
    }
    Ok(())
}

fn check_corpus_dir(settings: &Settings) -> Result<()> {
    let dir = settings.corpus_dir();
    if dir.is_dir() {
        Ok(())
    } else {
        Err(KanhuError::CorpusEmpty(format!(
            "corpus directory {} does not exist (set corpus.dir or PDF_DATA_DIR)",
            dir.display()
        )))
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str, probe_arg: &str) -> Result<()> {
    match Command::new(name).arg(probe_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(KanhuError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KanhuError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(KanhuError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_corpus_dir_fails() {
        let mut settings = Settings::default();
        settings.corpus.dir = "/nonexistent/kanhu-corpus".to_string();
        let err = check(Operation::Index, &settings).unwrap_err();
        assert!(matches!(err, KanhuError::CorpusEmpty(_)));
    }

    #[test]
    fn test_index_needs_only_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.corpus.dir = dir.path().to_string_lossy().into_owned();
        settings.transcription.ffmpeg_command = "kanhu-test-no-such-ffmpeg".to_string();

        assert!(check(Operation::Index, &settings).is_ok());
        assert!(matches!(
            check(Operation::Serve, &settings),
            Err(KanhuError::ToolNotFound(_))
        ));
    }
}
