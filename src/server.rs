//! HTTP interface.
//!
//! `POST /record`, `POST /submit` and `GET /audio/{filename}`, plus `/health`.
//! Error bodies are `{"error": "..."}` with the messages the caregiver
//! front end displays verbatim.

use crate::audio::AudioUpload;
use crate::error::KanhuError;
use crate::exchange::{Stage, StageError};
use crate::index::IndexStatus;
use crate::orchestrator::{AnswerArtifact, Orchestrator, RecordMode};
use axum::{
    body::Body,
    extract::{
        multipart::{Multipart, MultipartError},
        rejection::JsonRejection,
        DefaultBodyLimit, Path, Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MSG_EMPTY_QUESTION: &str = "請輸入問題。";
const MSG_NO_AUDIO: &str = "No audio file provided.";
const MSG_INVALID_MODE: &str = "Invalid mode.";
const MSG_AUDIO_NOT_FOUND: &str = "Audio file not found.";
const MSG_TRANSCRIPTION_FAILED: &str = "語音轉錄失敗：";
const MSG_PROCESSING_FAILED: &str = "處理失敗：";

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Arc<Self> {
        Arc::new(Self { orchestrator })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.orchestrator.services().settings.server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/record", post(record))
        .route("/submit", post(submit))
        .route("/audio/{filename}", get(audio))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_span))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run every request inside a span carrying a request id.
async fn request_span(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    question: Option<String>,
    #[serde(default, rename = "voiceMode", alias = "voice_mode")]
    voice_mode: bool,
}

#[derive(Serialize)]
struct SubmitResponse {
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
}

impl From<AnswerArtifact> for SubmitResponse {
    fn from(artifact: AnswerArtifact) -> Self {
        Self {
            answer: artifact.answer,
            audio: artifact.audio.map(|a| a.url),
        }
    }
}

#[derive(Serialize)]
struct RecordResponse {
    transcription: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    chunks: usize,
    fingerprint: String,
    index: &'static str,
    device: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn stage_error_response(err: StageError) -> Response {
    match (&err.source, err.stage) {
        (KanhuError::InvalidInput(_), Stage::Received) => {
            error_response(StatusCode::BAD_REQUEST, MSG_EMPTY_QUESTION)
        }
        (source, Stage::Transcribing | Stage::Transcribed) => {
            warn!("Transcription failed: {}", source);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}{}", MSG_TRANSCRIPTION_FAILED, source),
            )
        }
        (source, stage) => {
            error!(%stage, "Request failed: {}", source);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}{}", MSG_PROCESSING_FAILED, source),
            )
        }
    }
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let services = state.orchestrator.services();
    Json(HealthResponse {
        status: "ok",
        chunks: services.index.len(),
        fingerprint: services.fingerprint.short().to_string(),
        index: match services.index_status {
            IndexStatus::Loaded => "loaded",
            IndexStatus::Rebuilt { .. } => "rebuilt",
        },
        device: services.device.to_string(),
    })
}

async fn record(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let (upload, mode) = match read_record_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Malformed upload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.body_text());
        }
    };

    let Some(upload) = upload else {
        return error_response(StatusCode::BAD_REQUEST, MSG_NO_AUDIO);
    };
    let Some(mode) = mode.and_then(|m| m.parse::<RecordMode>().ok()) else {
        return error_response(StatusCode::BAD_REQUEST, MSG_INVALID_MODE);
    };

    match state.orchestrator.transcribe_or_voice(upload, mode).await {
        Ok(outcome) => {
            let (answer, audio) = match outcome.answer {
                Some(artifact) => (Some(artifact.answer), artifact.audio.map(|a| a.url)),
                None => (None, None),
            };
            Json(RecordResponse {
                transcription: outcome.transcription,
                answer,
                audio,
            })
            .into_response()
        }
        Err(e) => stage_error_response(e),
    }
}

async fn read_record_form(
    mut multipart: Multipart,
) -> Result<(Option<AudioUpload>, Option<String>), MultipartError> {
    let mut upload = None;
    let mut mode = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("audio") => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                upload = Some(AudioUpload::new(file_name, bytes.to_vec()));
            }
            Some("mode") => {
                mode = Some(field.text().await?);
            }
            _ => {}
        }
    }

    Ok((upload, mode))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected submit body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, MSG_EMPTY_QUESTION);
        }
    };

    let question = request.question.unwrap_or_default();
    match state.orchestrator.submit(&question, request.voice_mode).await {
        Ok(artifact) => Json(SubmitResponse::from(artifact)).into_response(),
        Err(e) => stage_error_response(e),
    }
}

async fn audio(State(state): State<Arc<AppState>>, Path(filename): Path<String>) -> Response {
    match state.orchestrator.fetch_audio(&filename).await {
        Ok((file, len)) => (
            [
                (header::CONTENT_TYPE, "audio/mpeg".to_string()),
                (header::CONTENT_LENGTH, len.to_string()),
            ],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response(),
        Err(KanhuError::NotFound(_) | KanhuError::InvalidInput(_)) => {
            error_response(StatusCode::NOT_FOUND, MSG_AUDIO_NOT_FOUND)
        }
        Err(e) => {
            error!("Failed to read {}: {}", filename, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}{}", MSG_PROCESSING_FAILED, e),
            )
        }
    }
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: Arc<AppState>, addr: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    Ok(())
}
