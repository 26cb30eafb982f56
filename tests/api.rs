use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use kanhu::audio::AudioConverter;
use kanhu::config::{EmbeddingProvider, Prompts, Settings};
use kanhu::device::ComputeDevice;
use kanhu::embedding::{create_embedder, Embedder};
use kanhu::index::IndexManager;
use kanhu::llm::{TextGenerator, UnavailableGenerator};
use kanhu::orchestrator::Orchestrator;
use kanhu::server::{router, AppState, REQUEST_ID_HEADER};
use kanhu::services::Services;
use kanhu::synthesis::Synthesizer;
use kanhu::transcription::{Transcriber, Transcription};
use kanhu::worker::InferencePool;
use kanhu::{KanhuError, Result};

const BOUNDARY: &str = "kanhu-test-boundary";
const MISSING_FFMPEG: &str = "kanhu-test-no-such-ffmpeg";

const BLOOD_SUGAR: &str = "空腹血糖的正常值為 70 到 99 mg/dL，超過 126 mg/dL 需就醫確認是否為糖尿病。";
const BLOOD_PRESSURE: &str = "成人血壓應低於 120/80 mmHg，收縮壓超過 140 mmHg 屬於高血壓。";
const EXERCISE: &str = "長者每週應進行 150 分鐘中等強度運動，例如快走或太極拳。";

/// Unrelated caregiving notes so retrieval has more chunks than it returns.
const FILLER: [&str; 12] = [
    "協助長者洗澡時，浴室地面要鋪防滑墊並保持乾燥。",
    "臥床者每兩小時翻身一次，可降低壓瘡發生的機會。",
    "吞嚥困難者的飲食可改為軟質或泥狀，進食時保持坐姿。",
    "夜間起身前先在床邊坐一分鐘，避免頭暈跌倒。",
    "藥盒依早中晚分格，每週固定一天補藥並核對藥袋。",
    "失智長者若在傍晚躁動，可安排散步並減少環境噪音。",
    "照顧者也需要休息，可申請喘息服務讓自己放鬆幾天。",
    "家中走道保持淨空，夜燈能幫助長者辨認方向。",
    "使用輪椅移位時，先固定煞車再協助起身。",
    "口腔清潔每天至少兩次，假牙睡前取下泡在清水中。",
    "天氣寒冷時注意保暖，洗澡水溫以手肘測試不燙為準。",
    "長期使用尿布要勤換並保持皮膚乾爽，避免濕疹。",
];

/// Returns the draft prompt unchanged.
struct EchoDrafter;

#[async_trait::async_trait]
impl TextGenerator for EchoDrafter {
    async fn generate(&self, _system: Option<&str>, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }

    fn name(&self) -> String {
        "echo-draft".to_string()
    }
}

struct PrefixRefiner;

#[async_trait::async_trait]
impl TextGenerator for PrefixRefiner {
    async fn generate(&self, _system: Option<&str>, prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(format!("ANSWER:: {}", prompt))
    }

    fn name(&self) -> String {
        "prefix-refine".to_string()
    }
}

/// Treats the uploaded bytes as UTF-8 speech.
struct TextFileTranscriber;

#[async_trait::async_trait]
impl Transcriber for TextFileTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
        let bytes = tokio::fs::read(audio_path).await?;
        Ok(Transcription::new(String::from_utf8_lossy(&bytes).trim()))
    }

    fn name(&self) -> String {
        "text-file".to_string()
    }
}

struct FailingTranscriber;

#[async_trait::async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Transcription> {
        Err(KanhuError::ModelInference("decoder crashed".to_string()))
    }

    fn name(&self) -> String {
        "failing".to_string()
    }
}

struct FakeSynthesizer;

#[async_trait::async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(format!("ID3:{}", text).into_bytes())
    }

    fn name(&self) -> String {
        "fake".to_string()
    }
}

struct TestApp {
    router: Router,
    root: TempDir,
}

impl TestApp {
    fn temp_dir(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    fn temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir())
            .map(|entries| entries.flatten().map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.general.data_dir = root.join("data").to_string_lossy().into_owned();
    settings.general.temp_dir = root.join("tmp").to_string_lossy().into_owned();
    settings.corpus.dir = root.join("corpus").to_string_lossy().into_owned();
    settings.index.dir = root.join("index").to_string_lossy().into_owned();
    settings.synthesis.output_dir = root.join("audio").to_string_lossy().into_owned();
    settings.embedding.provider = EmbeddingProvider::Hash;
    settings.embedding.hash_dimensions = 256;
    settings.transcription.ffmpeg_command = MISSING_FFMPEG.to_string();
    settings
}

async fn build_app(
    transcriber: Arc<dyn Transcriber>,
    refiner: Arc<dyn TextGenerator>,
) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let settings = test_settings(root.path());

    let corpus = settings.corpus_dir();
    std::fs::create_dir_all(&corpus).unwrap();
    std::fs::create_dir_all(settings.temp_dir()).unwrap();
    std::fs::write(corpus.join("blood_sugar.txt"), BLOOD_SUGAR).unwrap();
    std::fs::write(corpus.join("blood_pressure.txt"), BLOOD_PRESSURE).unwrap();
    std::fs::write(corpus.join("exercise.txt"), EXERCISE).unwrap();
    for (i, note) in FILLER.iter().enumerate() {
        std::fs::write(corpus.join(format!("note_{:02}.txt", i)), note).unwrap();
    }

    let pool = InferencePool::new(4, Duration::from_secs(30));
    let embedder: Arc<dyn Embedder> = create_embedder(&settings.embedding).unwrap();
    let outcome = IndexManager::new(&settings, embedder.clone(), pool.clone())
        .open(false)
        .await
        .unwrap();

    let services = Services {
        prompts: Prompts::default(),
        index: outcome.index,
        fingerprint: outcome.fingerprint,
        index_status: outcome.status,
        embedder,
        drafter: Arc::new(EchoDrafter),
        refiner,
        transcriber,
        synthesizer: Arc::new(FakeSynthesizer),
        converter: AudioConverter::new(MISSING_FFMPEG),
        pool,
        device: ComputeDevice::Cpu,
        settings,
    };

    let state = AppState::new(Orchestrator::new(Arc::new(services)));
    TestApp {
        router: router(state),
        root,
    }
}

async fn default_app() -> TestApp {
    build_app(Arc::new(TextFileTranscriber), Arc::new(PrefixRefiner)).await
}

fn submit_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn record_request(audio: Option<&[u8]>, mode: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"recording.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(mode) = mode {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"mode\"\r\n\r\n{mode}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/record")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_reports_index() {
    let app = default_app().await;

    let (status, body) = send_json(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunks"], 3 + FILLER.len());
    assert_eq!(body["index"], "rebuilt");
    assert_eq!(body["device"], "cpu");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = default_app().await;

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
}

#[tokio::test]
async fn test_submit_answers_from_corpus() {
    let app = default_app().await;

    let (status, body) = send_json(
        &app,
        submit_request(json!({"question": "空腹血糖正常值是多少？"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.starts_with("ANSWER:: "));
    assert!(answer.contains("70"));
    assert!(answer.contains("99"));
    assert!(answer.contains("空腹血糖正常值是多少？"));
    assert!(body.get("audio").is_none());

    // Only k chunks reach the prompt, so most of the notes are left out.
    let included = FILLER.iter().filter(|note| answer.contains(*note)).count();
    assert!(included < 6, "{} unrelated notes in the prompt", included);
}

#[tokio::test]
async fn test_submit_rejects_empty_question() {
    let app = default_app().await;

    for body in [json!({"question": ""}), json!({"question": "   "}), json!({})] {
        let (status, body) = send_json(&app, submit_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "請輸入問題。");
    }
}

#[tokio::test]
async fn test_submit_rejects_malformed_json() {
    let app = default_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "請輸入問題。");
}

#[tokio::test]
async fn test_submit_voice_mode_serves_audio() {
    let app = default_app().await;

    let (status, body) = send_json(
        &app,
        submit_request(json!({"question": "血壓多少算高？", "voiceMode": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let url = body["audio"].as_str().unwrap();
    assert!(url.starts_with("/audio/response_"));
    assert!(url.ends_with(".mp3"));

    let response = app.router.clone().oneshot(get(url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let expected = format!("ID3:{}", body["answer"].as_str().unwrap());
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        expected.len().to_string().as_str()
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), expected.as_bytes());
}

#[tokio::test]
async fn test_submit_accepts_snake_case_voice_flag() {
    let app = default_app().await;

    let (status, body) = send_json(
        &app,
        submit_request(json!({"question": "要運動多久？", "voice_mode": true})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["audio"].is_string());
}

#[tokio::test]
async fn test_concurrent_submits_keep_answers_separate() {
    let app = default_app().await;

    let requests = (0..8).map(|i| {
        let app = &app;
        async move {
            let tag = format!("[q-{:02}]", i);
            let (status, body) = send_json(
                app,
                submit_request(json!({"question": format!("{} 血糖控制的目標？", tag)})),
            )
            .await;
            (tag, status, body)
        }
    });

    for (tag, status, body) in futures::future::join_all(requests).await {
        assert_eq!(status, StatusCode::OK);
        let answer = body["answer"].as_str().unwrap();
        assert!(answer.contains(&tag), "{} missing from {}", tag, answer);
        for other in (0..8).map(|i| format!("[q-{:02}]", i)).filter(|t| *t != tag) {
            assert!(!answer.contains(&other));
        }
    }
}

#[tokio::test]
async fn test_refiner_failure_returns_apology() {
    let refiner = Arc::new(UnavailableGenerator::new("gemini", "no api key"));
    let app = build_app(Arc::new(TextFileTranscriber), refiner).await;

    let (status, body) = send_json(
        &app,
        submit_request(json!({"question": "空腹血糖正常值是多少？", "voiceMode": true})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], Prompts::default().refine.fallback.as_str());
    assert!(body["audio"].is_string());
}

#[tokio::test]
async fn test_record_transcribe_mode() {
    let app = default_app().await;

    let (status, body) = send_json(
        &app,
        record_request(Some("空腹血糖正常值是多少？".as_bytes()), Some("transcribe")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcription"], "空腹血糖正常值是多少？");
    assert!(body.get("answer").is_none());
    assert!(body.get("audio").is_none());
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_record_voice_mode_answers_and_speaks() {
    let app = default_app().await;

    let (status, body) = send_json(
        &app,
        record_request(Some("空腹血糖正常值是多少？".as_bytes()), Some("voice")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcription"], "空腹血糖正常值是多少？");
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.contains("70") && answer.contains("99"));
    assert!(body["audio"].as_str().unwrap().starts_with("/audio/"));
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_record_requires_audio_and_mode() {
    let app = default_app().await;

    let (status, body) = send_json(&app, record_request(None, Some("voice"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No audio file provided.");

    let (status, body) = send_json(&app, record_request(Some(b"hello"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid mode.");

    let (status, body) = send_json(&app, record_request(Some(b"hello"), Some("text"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid mode.");

    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_record_transcription_failure_cleans_up() {
    let app = build_app(Arc::new(FailingTranscriber), Arc::new(PrefixRefiner)).await;

    let (status, body) = send_json(&app, record_request(Some(b"noise"), Some("voice"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("語音轉錄失敗："));
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_record_transcribe_failure_cleans_up() {
    let app = build_app(Arc::new(FailingTranscriber), Arc::new(PrefixRefiner)).await;

    let (status, body) = send_json(&app, record_request(Some(b"noise"), Some("transcribe"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("語音轉錄失敗："));
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_record_empty_upload_fails_transcription() {
    let app = default_app().await;

    let (status, body) = send_json(&app, record_request(Some(b""), Some("transcribe"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("語音轉錄失敗："));
}

#[tokio::test]
async fn test_record_silence_in_voice_mode_is_error() {
    let app = default_app().await;

    let (status, body) = send_json(&app, record_request(Some(b"   "), Some("voice"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("語音轉錄失敗："));
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_audio_not_found_and_traversal() {
    let app = default_app().await;
    std::fs::write(app.root.path().join("secret.mp3"), b"secret").unwrap();

    for uri in [
        "/audio/response_missing.mp3",
        "/audio/..%2Fsecret.mp3",
        "/audio/.hidden.mp3",
    ] {
        let (status, body) = send_json(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "Audio file not found.");
    }
}

/// Round trip through the real speech providers. Needs network access and a
/// local `whisper` install.
#[tokio::test]
#[ignore]
async fn test_speech_round_trip() {
    use kanhu::synthesis::GoogleTranslateSynthesizer;
    use kanhu::transcription::LocalWhisperTranscriber;

    let dir = tempfile::tempdir().unwrap();
    let mp3 = dir.path().join("speech.mp3");

    let synthesizer = GoogleTranslateSynthesizer::new("zh-TW");
    let bytes = synthesizer.synthesize("血糖").await.unwrap();
    std::fs::write(&mp3, bytes).unwrap();

    let transcriber =
        LocalWhisperTranscriber::new("whisper", "base", ComputeDevice::Cpu, Some("zh".to_string()));
    let transcription = transcriber.transcribe(&mp3).await.unwrap();

    assert!(transcription.text.contains("血"));
}
