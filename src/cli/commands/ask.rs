//! Ask command: one question through retrieval, draft and refinement.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::services::{Services, StartupOptions};
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    voice: bool,
    k: Option<usize>,
    mut settings: Settings,
) -> anyhow::Result<()> {
    preflight::check(Operation::Index, &settings)?;

    if let Some(k) = k {
        settings.retrieval.k = k;
        settings.retrieval.fetch_k = settings.retrieval.fetch_k.max(k);
    }

    let services = Services::initialize(
        settings,
        StartupOptions {
            force_rebuild: false,
            progress: true,
        },
    )
    .await?;
    let orchestrator = Orchestrator::new(Arc::new(services));

    let spinner = Output::spinner("Thinking...");
    let result = orchestrator.submit(question, voice).await;
    spinner.finish_and_clear();

    let artifact = result?;

    Output::header("Answer");
    println!();
    println!("{}", artifact.answer);

    if artifact.degraded {
        println!();
        Output::warning("The answer pipeline failed; showing the fallback reply. Run with -v for details.");
    }

    if !artifact.sources.is_empty() {
        Output::header("Sources");
        for source in &artifact.sources {
            Output::source(&source.citation(), source.score, &source.content);
        }
    }

    if let Some(audio) = &artifact.audio {
        println!();
        Output::kv("Audio", &audio.path.display().to_string());
    }

    Ok(())
}
