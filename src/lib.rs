//! Kanhu - caregiver health Q&A over a local document corpus
//!
//! An HTTP service that answers health questions from caregivers, typed or
//! spoken, using retrieval over a folder of reference documents.
//!
//! The name "Kanhu" comes from the Taiwanese Hokkien word for "caring for" someone.
//!
//! # Overview
//!
//! - The corpus is fingerprinted at startup; the vector index is rebuilt only
//!   when the documents change.
//! - Each question is answered in two stages: a local model drafts from the
//!   retrieved context, a cloud model refines the draft.
//! - Voice input is normalized with ffmpeg and transcribed; answers can be
//!   spoken back as MP3 files served from `/audio/{filename}`.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `corpus` / `chunking` - Document loading and splitting
//! - `embedding` / `vector_store` / `index` - Embeddings, search and the persisted index
//! - `llm` / `rag` - Draft and refine generators, retrieval context
//! - `transcription` / `synthesis` / `audio` - Speech in, speech out, temp files
//! - `worker` - Bounded, deadline-guarded inference
//! - `services` / `orchestrator` / `server` - Startup, request pipeline, HTTP
//!
//! # Example
//!
//! ```rust,no_run
//! use kanhu::config::Settings;
//! use kanhu::orchestrator::Orchestrator;
//! use kanhu::services::{Services, StartupOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let services = Services::initialize(settings, StartupOptions::default()).await?;
//!     let orchestrator = Orchestrator::new(Arc::new(services));
//!
//!     let answer = orchestrator.submit("What is a normal fasting blood sugar?", false).await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod device;
pub mod embedding;
pub mod error;
pub mod exchange;
pub mod index;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod server;
pub mod services;
pub mod synthesis;
pub mod transcription;
pub mod vector_store;
pub mod worker;

pub use error::{KanhuError, Result};
