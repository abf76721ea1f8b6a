//! # conspectium-inference
//!
//! AI capability abstraction for Conspectium.
//!
//! This crate provides:
//! - The [`AiBackend`] trait: transcription, note variants, quizzes
//! - An OpenAI-compatible HTTP implementation ([`OpenAIBackend`])
//! - Prompt builders and lenient model-JSON decoding
//! - Provider error classification into transient/permanent [`AiError`]s
//! - A scripted mock backend (feature `mock`)

pub mod backend;
pub mod json;
pub mod openai;
pub mod prompts;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use conspectium_core::{AiError, AiFailureClass, NoteVariant};

pub use backend::{
    AiBackend, AnswerDraft, QuestionDraft, QuizDraft, TranscriptionOutput, VariantDraft,
};
pub use openai::{OpenAIBackend, OpenAIConfig};
