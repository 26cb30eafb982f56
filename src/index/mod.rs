//! Fingerprint-gated vector index lifecycle.
//!
//! On startup the corpus is fingerprinted. If the persisted index was built
//! from the same bytes (and the same embedding model) it is loaded as is;
//! otherwise the corpus is parsed, chunked and embedded again and the result
//! replaces the persisted copy.

mod fingerprint;
mod store;

pub use fingerprint::Fingerprint;
pub use store::IndexStore;

use crate::chunking::{chunk_documents, RecursiveCharacterSplitter};
use crate::config::Settings;
use crate::corpus::{list_corpus_files, load_documents};
use crate::embedding::Embedder;
use crate::error::{KanhuError, Result};
use crate::vector_store::VectorIndex;
use crate::worker::{offload, InferencePool};
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// How the index was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    /// Loaded from disk; fingerprint matched.
    Loaded,
    /// Built from the corpus.
    Rebuilt { reason: String },
}

/// Result of [`IndexManager::open`].
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub index: Arc<VectorIndex>,
    pub fingerprint: Fingerprint,
    pub status: IndexStatus,
    /// Number of corpus files that contributed to the fingerprint.
    pub files: usize,
}

/// Loads or rebuilds the index for the configured corpus.
pub struct IndexManager {
    store: IndexStore,
    corpus_dir: PathBuf,
    extensions: Vec<String>,
    splitter: RecursiveCharacterSplitter,
    embedder: Arc<dyn Embedder>,
    pool: InferencePool,
    concurrency: usize,
    show_progress: bool,
}

impl IndexManager {
    pub fn new(settings: &Settings, embedder: Arc<dyn Embedder>, pool: InferencePool) -> Self {
        Self {
            store: IndexStore::new(settings.index_dir()),
            corpus_dir: settings.corpus_dir(),
            extensions: settings.corpus.extensions.clone(),
            splitter: RecursiveCharacterSplitter::new(
                settings.corpus.chunk_size,
                settings.corpus.chunk_overlap,
            ),
            embedder,
            pool,
            concurrency: settings.pool.max_concurrent.max(1),
            show_progress: false,
        }
    }

    /// Show a progress bar on stderr while embedding.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Load the persisted index if it matches the corpus, otherwise rebuild it.
    ///
    /// `force` skips the load attempt.
    #[instrument(skip(self), fields(corpus = %self.corpus_dir.display()))]
    pub async fn open(&self, force: bool) -> Result<IndexOutcome> {
        let files = list_corpus_files(&self.corpus_dir, &self.extensions)?;
        if files.is_empty() {
            return Err(KanhuError::CorpusEmpty(format!(
                "no {} files in {}",
                self.extensions.join("/"),
                self.corpus_dir.display()
            )));
        }

        let hashed = files.clone();
        let fingerprint = offload("fingerprint", move || Ok(Fingerprint::compute(&hashed))).await?;
        info!("Corpus fingerprint {} ({} files)", fingerprint.short(), files.len());

        let reason = if force {
            "rebuild requested".to_string()
        } else {
            let store = self.store.clone();
            let expected = fingerprint.clone();
            let model_id = self.embedder.model_id();
            match offload("index load", move || store.load(&expected, &model_id)).await {
                Ok(index) => {
                    info!("Loaded index with {} chunks", index.len());
                    return Ok(IndexOutcome {
                        index: Arc::new(index),
                        fingerprint,
                        status: IndexStatus::Loaded,
                        files: files.len(),
                    });
                }
                Err(e) => {
                    warn!("Rebuilding index: {}", e);
                    e.to_string()
                }
            }
        };

        let index = self.rebuild(&files).await?;

        let store = self.store.clone();
        let persisted = Arc::new(index);
        let to_save = persisted.clone();
        let fp = fingerprint.clone();
        if let Err(e) = offload("index save", move || store.save(&fp, &to_save)).await {
            // The in-memory index is still usable; the next start rebuilds.
            warn!("Failed to persist index: {}", e);
        }

        Ok(IndexOutcome {
            index: persisted,
            fingerprint,
            status: IndexStatus::Rebuilt { reason },
            files: files.len(),
        })
    }

    async fn rebuild(&self, files: &[PathBuf]) -> Result<VectorIndex> {
        let paths = files.to_vec();
        let splitter = self.splitter.clone();
        let chunks = offload("corpus parse", move || {
            let documents = load_documents(&paths)?;
            Ok(chunk_documents(&splitter, &documents))
        })
        .await?;

        if chunks.is_empty() {
            return Err(KanhuError::CorpusEmpty(
                "documents produced no text chunks".to_string(),
            ));
        }
        info!("Embedding {} chunks with {}", chunks.len(), self.embedder.model_id());

        let pb = if self.show_progress {
            let pb = ProgressBar::new(chunks.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.green} Embedding [{bar:30.cyan/blue}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let embeddings: Vec<Vec<f32>> = stream::iter(chunks.iter())
            .map(|chunk| self.pool.run("embed", self.embedder.embed(&chunk.text)))
            .buffered(self.concurrency)
            .inspect(|_| pb.inc(1))
            .try_collect()
            .await
            .inspect_err(|_| pb.abandon())?;
        pb.finish_and_clear();

        VectorIndex::build(self.embedder.model_id(), chunks, embeddings)
    }
}
