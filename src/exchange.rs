//! Per-request exchange state.

use crate::error::KanhuError;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Stages of one question/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Transcribing,
    Transcribed,
    Retrieving,
    Drafting,
    Refining,
    Answered,
    Synthesizing,
    Complete,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Transcribing => "transcribing",
            Stage::Transcribed => "transcribed",
            Stage::Retrieving => "retrieving",
            Stage::Drafting => "drafting",
            Stage::Refining => "refining",
            Stage::Answered => "answered",
            Stage::Synthesizing => "synthesizing",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }

    /// Whether a failure at this stage still yields an answer (the apology).
    pub fn is_answer_stage(&self) -> bool {
        matches!(self, Stage::Retrieving | Stage::Drafting | Stage::Refining)
    }

    fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Received, Transcribing)
                | (Received, Retrieving)
                | (Transcribing, Transcribed)
                | (Transcribed, Retrieving)
                | (Transcribed, Complete)
                | (Retrieving, Drafting)
                | (Drafting, Refining)
                | (Refining, Answered)
                // Degraded answers skip the remaining answer stages.
                | (Retrieving, Answered)
                | (Drafting, Answered)
                | (Answered, Synthesizing)
                | (Answered, Complete)
                | (Synthesizing, Complete)
        ) || (next == Failed && self != Complete && self != Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: KanhuError,
}

impl StageError {
    pub fn new(stage: Stage, source: KanhuError) -> Self {
        Self { stage, source }
    }
}

/// Tracks one request through its stages.
#[derive(Debug)]
pub struct Exchange {
    id: Uuid,
    stage: Stage,
}

impl Exchange {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Received,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to the next stage. Out-of-order transitions are logged and ignored.
    pub fn advance(&mut self, next: Stage) {
        if self.stage.can_advance_to(next) {
            debug!(exchange = %self.id, "{} -> {}", self.stage, next);
            self.stage = next;
        } else {
            debug!(exchange = %self.id, "ignoring transition {} -> {}", self.stage, next);
        }
    }

    /// Mark the exchange failed and tag the error with the stage it happened in.
    pub fn fail(&mut self, source: KanhuError) -> StageError {
        let error = StageError::new(self.stage, source);
        self.advance(Stage::Failed);
        error
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}
