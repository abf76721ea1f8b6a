//! # conspectium-jobs
//!
//! Generation pipeline and background job worker for Conspectium.
//!
//! This crate provides:
//! - [`GenerationService`]: job creation and the note/quiz job state machine
//! - Transcript acquisition with transient/permanent failure handling
//! - Note variant merging and Markdown-to-plain summaries
//! - Deterministic offline fallbacks for non-production environments
//! - An explicit [`FailurePolicy`] table
//! - A dispatch-driven [`JobWorker`] with bounded concurrency and events
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use conspectium_jobs::{
//!     GenerationService, NoteJobHandler, QuizJobHandler, WorkerBuilder, WorkerConfig,
//! };
//!
//! let service = Arc::new(GenerationService::new(repo, storage, ai, PipelineConfig::from_env()));
//!
//! let worker = WorkerBuilder::new()
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(NoteJobHandler::new(service.clone()))
//!     .with_handler(QuizJobHandler::new(service.clone()))
//!     .build()
//!     .await;
//! let handle = worker.start();
//!
//! let job = service.create_note_job(owner, request).await?;
//! handle.dispatcher().dispatch(&job).await?;
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod fallback;
pub mod handler;
pub mod markdown;
pub mod note_generator;
pub mod policy;
pub mod quiz_generator;
pub mod service;
pub mod transcript;
pub mod worker;

// Re-export core types
pub use conspectium_core::*;

pub use fallback::{build_local_note, build_local_quiz, split_sentences};
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler, NoteJobHandler, QuizJobHandler};
pub use markdown::{strip_markdown, strip_markdown_with_limit};
pub use note_generator::{GenerationMode, NoteGeneration};
pub use policy::{FailurePolicy, FailureResponse, Operation};
pub use quiz_generator::QuizGeneration;
pub use service::{AudioUpload, CreateNoteRequest, GenerationService, QUIZ_RETRY_HINT};
pub use transcript::{ObtainedTranscript, PLACEHOLDER_TRANSCRIPT, TRANSCRIPTION_RETRY_HINT};
pub use worker::{JobDispatcher, JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
