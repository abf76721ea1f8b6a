//! The AI capability consumed by the generation pipeline.
//!
//! Every method returns [`AiError`], which carries a transient/permanent
//! classification. Adapters map provider errors onto it; the pipeline only
//! ever looks at the class.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use conspectium_core::{AiError, NoteVariant};

/// Result of a speech-to-text call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    #[serde(default, alias = "text")]
    pub transcript: String,
    #[serde(default, alias = "duration")]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub language: Option<String>,
}

/// One generated note variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// A generated quiz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default, alias = "title")]
    pub question: String,
    #[serde(default)]
    pub answers: Vec<AnswerDraft>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerDraft {
    #[serde(default, alias = "answer")]
    pub text: String,
    #[serde(default, alias = "correct")]
    pub is_correct: bool,
}

/// AI capability: transcription, note variants, quizzes.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Transcribe an audio blob.
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<TranscriptionOutput, AiError>;

    /// Generate one Markdown variant of a note from source text.
    async fn generate_note_variant(
        &self,
        text: &str,
        variant: NoteVariant,
    ) -> Result<VariantDraft, AiError>;

    /// Generate a quiz of roughly `question_count` questions from text.
    async fn generate_quiz(&self, text: &str, question_count: u32) -> Result<QuizDraft, AiError>;

    /// Model identifier recorded on generated entities.
    fn model_name(&self) -> &str;
}
