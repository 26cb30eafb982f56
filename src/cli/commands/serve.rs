//! Serve command: verify the index, then start the HTTP API.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::index::IndexStatus;
use crate::orchestrator::Orchestrator;
use crate::server::{self, AppState};
use crate::services::{Services, StartupOptions};
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    rebuild: bool,
    mut settings: Settings,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }

    preflight::check(Operation::Serve, &settings)?;

    Output::header("Kanhu API Server");
    println!();
    Output::info(&format!("Checking index for {}", settings.corpus_dir().display()));

    let options = StartupOptions {
        force_rebuild: rebuild,
        progress: true,
    };
    let services = Services::initialize(settings, options).await?;

    match &services.index_status {
        IndexStatus::Loaded => Output::success(&format!(
            "Loaded existing index ({} chunks, fingerprint {})",
            services.index.len(),
            services.fingerprint.short()
        )),
        IndexStatus::Rebuilt { reason } => Output::success(&format!(
            "Rebuilt index ({} chunks): {}",
            services.index.len(),
            reason
        )),
    }
    Output::kv("Device", services.device.as_str());
    Output::kv("Draft model", &services.drafter.name());
    Output::kv("Refine model", &services.refiner.name());

    let addr = format!("{}:{}", services.settings.server.host, services.settings.server.port);
    let state = AppState::new(Orchestrator::new(Arc::new(services)));

    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Record", "POST /record");
    Output::kv("Submit", "POST /submit");
    Output::kv("Audio", "GET  /audio/{filename}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(state, &addr).await?;

    Output::info("Server stopped.");
    Ok(())
}
