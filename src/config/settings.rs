//! Configuration settings for Kanhu.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub corpus: CorpusSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub draft: DraftSettings,
    pub refine: RefineSettings,
    pub retrieval: RetrievalSettings,
    pub transcription: TranscriptionSettings,
    pub synthesis: SynthesisSettings,
    pub pool: PoolSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for per-request temporary audio files.
    pub temp_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.kanhu".to_string(),
            temp_dir: std::env::temp_dir()
                .join("kanhu")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body (audio uploads), in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Reference document corpus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Directory holding the reference documents.
    pub dir: String,
    /// File extensions (without dot) that belong to the corpus.
    pub extensions: Vec<String>,
    /// Chunk window in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            dir: "~/.kanhu/corpus".to_string(),
            extensions: vec!["pdf".to_string(), "txt".to_string(), "md".to_string()],
            chunk_size: 600,
            chunk_overlap: 150,
        }
    }
}

/// Persisted vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the serialized index and its fingerprint record.
    pub dir: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dir: "~/.kanhu/index".to_string(),
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama server.
    #[default]
    Ollama,
    /// Offline feature-hashing embedder (no model required).
    Hash,
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    /// Embedding model name.
    pub model: String,
    /// Ollama base URL.
    pub base_url: String,
    /// Vector size for the hashing provider.
    pub hash_dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: "llama3.2:latest".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
            hash_dimensions: 384,
        }
    }
}

/// Local draft model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftSettings {
    /// Ollama model used for the grounded draft.
    pub model: String,
    /// Ollama base URL.
    pub base_url: String,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2:latest".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
        }
    }
}

/// Cloud refinement settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineSettings {
    pub model: String,
    /// API base of the chat-completions endpoint.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.3,
        }
    }
}

impl RefineSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks handed to the models.
    pub k: usize,
    /// Number of nearest candidates considered before diversity selection.
    pub fetch_k: usize,
    /// Relevance weight in diversity selection (1.0 = pure relevance).
    pub lambda: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 6,
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

/// Transcription provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Local Whisper command line on the probed device.
    #[default]
    Local,
    /// OpenAI Whisper API.
    Openai,
}

impl std::fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionProvider::Local => write!(f, "local"),
            TranscriptionProvider::Openai => write!(f, "openai"),
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub provider: TranscriptionProvider,
    /// Whisper model (`base` locally, `whisper-1` for OpenAI).
    pub model: String,
    /// Whisper command line executable.
    pub whisper_command: String,
    /// ffmpeg executable used for format normalization.
    pub ffmpeg_command: String,
    /// Language hint passed to the model.
    pub language: Option<String>,
    /// Per-call timeout for transcription in seconds.
    pub timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Local,
            model: "base".to_string(),
            whisper_command: "whisper".to_string(),
            ffmpeg_command: "ffmpeg".to_string(),
            language: Some("zh".to_string()),
            timeout_seconds: 300,
        }
    }
}

/// Speech synthesis provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisProvider {
    /// Google Translate text-to-speech endpoint.
    #[default]
    Google,
    /// OpenAI speech API.
    Openai,
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub provider: SynthesisProvider,
    /// Spoken language tag.
    pub language: String,
    /// Directory where synthesized answers are kept for `/audio/<filename>`.
    pub output_dir: String,
    /// Voice for the OpenAI provider.
    pub voice: String,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            provider: SynthesisProvider::Google,
            language: "zh-TW".to_string(),
            output_dir: "~/.kanhu/audio".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

/// Inference worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum inference calls in flight across all requests.
    pub max_concurrent: usize,
    /// Per-call timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout_seconds: 120,
        }
    }
}

impl PoolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file contents.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply deployment environment variables.
    ///
    /// Takes a lookup function so callers (and tests) decide where values come from.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("PDF_DATA_DIR") {
            self.corpus.dir = dir;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            self.embedding.model = model.clone();
            self.draft.model = model;
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.embedding.base_url = url.clone();
            self.draft.base_url = url;
        }
        if let Some(dir) = get("AUDIO_OUTPUT_DIR") {
            self.synthesis.output_dir = dir;
        }
        if let Some(dir) = get("FFMPEG_PATH") {
            self.transcription.ffmpeg_command = PathBuf::from(dir)
                .join(if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" })
                .to_string_lossy()
                .into_owned();
        }
        if let Some(host) = get("KANHU_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("KANHU_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KanhuError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kanhu")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    pub fn corpus_dir(&self) -> PathBuf {
        Self::expand_path(&self.corpus.dir)
    }

    pub fn index_dir(&self) -> PathBuf {
        Self::expand_path(&self.index.dir)
    }

    pub fn audio_output_dir(&self) -> PathBuf {
        Self::expand_path(&self.synthesis.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_retrieval_contract() {
        let settings = Settings::default();
        assert_eq!(settings.corpus.chunk_size, 600);
        assert_eq!(settings.corpus.chunk_overlap, 150);
        assert_eq!(settings.retrieval.k, 6);
        assert_eq!(settings.retrieval.fetch_k, 20);
        assert_eq!(settings.synthesis.language, "zh-TW");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PDF_DATA_DIR", "/srv/pdfs"),
            ("OLLAMA_MODEL", "qwen2.5:7b"),
            ("AUDIO_OUTPUT_DIR", "/srv/audio"),
            ("FFMPEG_PATH", "/opt/ffmpeg/bin"),
            ("KANHU_PORT", "8080"),
            ("KANHU_HOST", "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.corpus_dir(), PathBuf::from("/srv/pdfs"));
        assert_eq!(settings.embedding.model, "qwen2.5:7b");
        assert_eq!(settings.draft.model, "qwen2.5:7b");
        assert_eq!(settings.audio_output_dir(), PathBuf::from("/srv/audio"));
        assert!(settings.transcription.ffmpeg_command.starts_with("/opt/ffmpeg/bin"));
        assert_eq!(settings.server.port, 8080);
        // Blank values are ignored.
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [retrieval]
            k = 4

            [transcription]
            provider = "openai"
            model = "whisper-1"
            "#,
        )
        .unwrap();

        assert_eq!(settings.retrieval.k, 4);
        assert_eq!(settings.retrieval.fetch_k, 20);
        assert_eq!(settings.transcription.provider, TranscriptionProvider::Openai);
        assert_eq!(settings.transcription.ffmpeg_command, "ffmpeg");
    }
}
