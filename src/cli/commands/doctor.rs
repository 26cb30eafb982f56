//! Doctor command - verify tools, model endpoints and the corpus.

use crate::cli::Output;
use crate::config::{Settings, SynthesisProvider, TranscriptionProvider};
use crate::corpus::list_corpus_files;
use crate::device::probe_device;
use crate::index::IndexStore;
use console::style;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, results: &[CheckResult]) {
    println!("{}", style(title).bold());
    for result in results {
        result.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&str>) -> anyhow::Result<()> {
    Output::header("Kanhu Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let mut tools = vec![check_tool(
        "ffmpeg",
        &settings.transcription.ffmpeg_command,
        "-version",
        install_hint_ffmpeg(),
    )];
    if settings.transcription.provider == TranscriptionProvider::Local {
        tools.push(check_tool(
            "whisper",
            &settings.transcription.whisper_command,
            "--help",
            "Install with: pip install openai-whisper",
        ));
        tools.push(CheckResult::ok("Compute device", probe_device().as_str()));
    }
    print_section("External Tools", &tools);
    checks.extend(tools);

    let models = vec![
        check_ollama(&settings.draft.base_url, &settings.draft.model).await,
        check_refine_key(settings),
        check_cloud_key(settings),
    ];
    print_section("Models", &models);
    checks.extend(models);

    let dirs = check_directories(settings);
    print_section("Corpus and Index", &dirs);
    checks.extend(dirs);

    let config = vec![check_config_file(config_path)];
    print_section("Configuration", &config);
    checks.extend(config);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before serving.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Kanhu is ready to serve.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, command: &str, probe_arg: &str, hint: &str) -> CheckResult {
    match Command::new(command).arg(probe_arg).output() {
        Ok(output) if output.status.success() => {
            let first_line = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            let display: String = first_line.chars().take(50).collect();
            CheckResult::ok(name, &display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, &format!("{} not found", command), hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check that the Ollama server answers and has the draft model.
async fn check_ollama(base_url: &str, model: &str) -> CheckResult {
    let hint = format!("Start Ollama and run: ollama pull {}", model);
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => return CheckResult::error("Ollama", &e.to_string(), &hint),
    };

    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            return CheckResult::error("Ollama", &format!("HTTP {}", response.status()), &hint)
        }
        Err(_) => return CheckResult::error("Ollama", &format!("unreachable at {}", base_url), &hint),
    };

    let tags: serde_json::Value = match response.json().await {
        Ok(tags) => tags,
        Err(e) => return CheckResult::warning("Ollama", &format!("unexpected reply: {}", e), &hint),
    };

    if has_model(&tags, model) {
        CheckResult::ok("Ollama", &format!("{} available", model))
    } else {
        CheckResult::warning("Ollama", &format!("{} not pulled", model), &hint)
    }
}

/// Match a model name against an Ollama `/api/tags` reply; an untagged name matches `:latest`.
fn has_model(tags: &serde_json::Value, model: &str) -> bool {
    let wanted = if model.contains(':') {
        model.to_string()
    } else {
        format!("{}:latest", model)
    };
    tags["models"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m["name"].as_str())
                .any(|name| name == model || name == wanted)
        })
        .unwrap_or(false)
}

fn check_refine_key(settings: &Settings) -> CheckResult {
    let name = &settings.refine.api_key_env;
    match settings.refine.api_key() {
        Some(key) => CheckResult::ok(name, &format!("configured ({})", mask_key(&key))),
        None => CheckResult::warning(
            name,
            "not set",
            &format!(
                "Answers fall back to the apology text. Set with: export {}='...'",
                name
            ),
        ),
    }
}

/// OpenAI key, needed only when a cloud speech provider is selected.
fn check_cloud_key(settings: &Settings) -> CheckResult {
    let needed = settings.transcription.provider == TranscriptionProvider::Openai
        || settings.synthesis.provider == SynthesisProvider::Openai;
    if !needed {
        return CheckResult::ok("OPENAI_API_KEY", "not required");
    }
    if crate::openai::is_api_key_configured() {
        CheckResult::ok("OPENAI_API_KEY", "configured")
    } else {
        CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Required by the openai speech provider. Set with: export OPENAI_API_KEY='sk-...'",
        )
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let corpus_dir = settings.corpus_dir();
    match list_corpus_files(&corpus_dir, &settings.corpus.extensions) {
        Ok(files) if files.is_empty() => results.push(CheckResult::error(
            "Corpus",
            &format!("{} has no documents", corpus_dir.display()),
            "Add PDF files or set PDF_DATA_DIR",
        )),
        Ok(files) => {
            let total: u64 = files
                .iter()
                .filter_map(|f| std::fs::metadata(f).ok())
                .map(|m| m.len())
                .sum();
            results.push(CheckResult::ok(
                "Corpus",
                &format!("{} document(s), {} in {}", files.len(), format_size(total), corpus_dir.display()),
            ));
        }
        Err(_) => results.push(CheckResult::error(
            "Corpus",
            &format!("{} not readable", corpus_dir.display()),
            "Create the directory or set PDF_DATA_DIR",
        )),
    }

    let store = IndexStore::new(settings.index_dir());
    results.push(match store.recorded_fingerprint() {
        Some(fingerprint) => CheckResult::ok(
            "Index",
            &format!("{} (fingerprint {})", store.dir().display(), fingerprint.short()),
        ),
        None => CheckResult::warning(
            "Index",
            "not built yet",
            "Built on first serve, or run: kanhu index",
        ),
    });

    results.push(check_writable("Audio output", &settings.audio_output_dir()));
    results.push(check_writable("Temp directory", &settings.temp_dir()));

    results
}

fn check_writable(name: &str, dir: &Path) -> CheckResult {
    if !dir.exists() {
        return CheckResult::warning(
            name,
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first use",
        );
    }
    match tempfile::tempfile_in(dir) {
        Ok(_) => CheckResult::ok(name, &dir.display().to_string()),
        Err(e) => CheckResult::error(
            name,
            &format!("{} not writable: {}", dir.display(), e),
            "Fix the directory permissions",
        ),
    }
}

fn check_config_file(config_path: Option<&str>) -> CheckResult {
    let path = config_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    if path.exists() {
        CheckResult::ok("Config file", &path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: kanhu config init",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg (or set FFMPEG_PATH)"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or set FFMPEG_PATH)"
    } else {
        "Install from https://ffmpeg.org/download.html and set FFMPEG_PATH"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_model_matches_latest_tag() {
        let tags = json!({"models": [{"name": "gemma3:latest"}, {"name": "nomic-embed-text:v1.5"}]});
        assert!(has_model(&tags, "gemma3"));
        assert!(has_model(&tags, "nomic-embed-text:v1.5"));
        assert!(!has_model(&tags, "llama3"));
        assert!(!has_model(&json!({}), "gemma3"));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("AIzaSyExampleKey1234"), "AIza...1234");
    }

    #[test]
    fn test_missing_tool_is_error() {
        let result = check_tool("ffmpeg", "kanhu-test-no-such-ffmpeg", "-version", "hint");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint.as_deref(), Some("hint"));
    }

    #[test]
    fn test_empty_corpus_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.corpus.dir = dir.path().to_string_lossy().into_owned();
        settings.index.dir = dir.path().join("index").to_string_lossy().into_owned();

        let results = check_directories(&settings);
        assert_eq!(results[0].status, CheckStatus::Error);
        assert_eq!(results[1].status, CheckStatus::Warning);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
