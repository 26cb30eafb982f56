//! Index command: fingerprint the corpus and rebuild the index when stale.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::index::{IndexManager, IndexStatus};
use crate::worker::InferencePool;

/// Run the index command.
pub async fn run_index(force: bool, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Index, &settings)?;

    let embedder = create_embedder(&settings.embedding)?;
    let pool = InferencePool::new(settings.pool.max_concurrent, settings.pool.timeout());
    let manager = IndexManager::new(&settings, embedder, pool).with_progress(true);

    if let Some(recorded) = manager.store().recorded_fingerprint() {
        Output::kv("Recorded fingerprint", recorded.short());
    }

    let outcome = manager.open(force).await?;

    Output::kv("Documents", &outcome.files.to_string());
    Output::kv("Chunks", &outcome.index.len().to_string());
    Output::kv("Fingerprint", outcome.fingerprint.short());
    Output::kv("Location", &manager.store().dir().display().to_string());

    match outcome.status {
        IndexStatus::Loaded => Output::success("Index is up to date."),
        IndexStatus::Rebuilt { reason } => Output::success(&format!("Index rebuilt: {}", reason)),
    }

    Ok(())
}
