//! Inference worker pool.
//!
//! Every model call (embedding, local draft, cloud refinement, transcription,
//! synthesis) and every per-request CPU-heavy step goes through one
//! [`InferencePool`], which bounds how many run at once and gives each a
//! deadline. Dropping the returned future cancels the call; blocking closures
//! run on tokio's blocking threads so the request scheduler is never stalled.
//!
//! Startup work that scales with the corpus (hashing, parsing, index IO) uses
//! [`offload`] instead: it runs off the async threads but has no deadline.

use crate::error::{KanhuError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Bounded, deadline-enforcing executor for inference calls.
#[derive(Clone, Debug)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl InferencePool {
    /// Create a pool allowing `max_concurrent` calls in flight, each limited to `timeout`.
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// A handle sharing the same permits but with a different per-call deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            permits: self.permits.clone(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run an async inference call under a permit and the pool deadline.
    pub async fn run<F, T>(&self, label: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| KanhuError::ModelInference(format!("{}: worker pool closed", label)))?;

        debug!(label, "inference call started");
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(label, "inference call timed out after {:?}", self.timeout);
                Err(KanhuError::Timeout {
                    label,
                    after: self.timeout,
                })
            }
        }
    }

    /// Run a blocking closure on the blocking thread pool under a permit and the deadline.
    pub async fn run_blocking<F, T>(&self, label: &'static str, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(label, offload(label, work)).await
    }
}

/// Run a blocking closure on the blocking thread pool, without a permit or deadline.
pub async fn offload<F, T>(label: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| KanhuError::ModelInference(format!("{}: worker failed: {}", label, e)))?
}
