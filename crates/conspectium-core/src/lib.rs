//! # conspectium-core
//!
//! Core types, traits, and abstractions for the Conspectium note and quiz
//! generation backend.
//!
//! This crate provides:
//! - Domain models (audio sources, notes, quizzes, generation jobs)
//! - Job options with deterministic decoding
//! - The [`GenerationRepository`] persistence boundary
//! - Error types, including the provider-independent [`AiError`]
//! - Pipeline configuration and shared defaults
//! - Quiz scoring

pub mod config;
pub mod defaults;
pub mod error;
pub mod models;
pub mod scoring;
pub mod traits;
pub mod uuid_utils;

pub use config::{Environment, PipelineConfig};
pub use error::{AiError, AiFailureClass, Error, Result};
pub use models::*;
pub use scoring::{score_submission, ScoreSummary};
pub use traits::GenerationRepository;
pub use uuid_utils::new_v7;
