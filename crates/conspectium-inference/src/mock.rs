//! Scripted mock AI backend for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conspectium_inference::mock::MockAiBackend;
//! use conspectium_inference::{AiError, NoteVariant};
//!
//! let backend = MockAiBackend::new()
//!     .with_transcript("Первое. Второе.")
//!     .with_variant_failure(NoteVariant::Full, AiError::transient("429"));
//! assert_eq!(backend.calls().len(), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use conspectium_core::{AiError, NoteVariant};

use crate::backend::{
    AiBackend, AnswerDraft, QuestionDraft, QuizDraft, TranscriptionOutput, VariantDraft,
};

/// Model name reported by the mock backend.
pub const MOCK_MODEL: &str = "mock-model";

/// Mock AI backend with per-operation scripted outputs and failures.
#[derive(Clone, Default)]
pub struct MockAiBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    transcript: Option<String>,
    transcription_failure: Option<AiError>,
    variants: HashMap<NoteVariant, VariantDraft>,
    variant_failures: HashMap<NoteVariant, AiError>,
    quiz: Option<QuizDraft>,
    quiz_failure: Option<AiError>,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: &'static str,
    pub variant: Option<NoteVariant>,
    pub input: String,
}

impl MockAiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript returned by `transcribe`.
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).transcript = Some(transcript.into());
        self
    }

    pub fn with_transcription_failure(mut self, err: AiError) -> Self {
        Arc::make_mut(&mut self.config).transcription_failure = Some(err);
        self
    }

    /// Draft returned for one variant, replacing the derived default.
    pub fn with_variant(mut self, variant: NoteVariant, draft: VariantDraft) -> Self {
        Arc::make_mut(&mut self.config)
            .variants
            .insert(variant, draft);
        self
    }

    pub fn with_variant_failure(mut self, variant: NoteVariant, err: AiError) -> Self {
        Arc::make_mut(&mut self.config)
            .variant_failures
            .insert(variant, err);
        self
    }

    /// Fail every variant with the same error.
    pub fn with_generation_failure(mut self, err: AiError) -> Self {
        let config = Arc::make_mut(&mut self.config);
        for variant in NoteVariant::ALL {
            config.variant_failures.insert(variant, err.clone());
        }
        self
    }

    pub fn with_quiz(mut self, quiz: QuizDraft) -> Self {
        Arc::make_mut(&mut self.config).quiz = Some(quiz);
        self
    }

    pub fn with_quiz_failure(mut self, err: AiError) -> Self {
        Arc::make_mut(&mut self.config).quiz_failure = Some(err);
        self
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Number of calls to one operation (`transcribe`, `generate_note_variant`,
    /// `generate_quiz`).
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn record(&self, operation: &'static str, variant: Option<NoteVariant>, input: &str) {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                operation,
                variant,
                input: input.to_string(),
            });
        }
    }

    fn default_variant(text: &str, variant: NoteVariant) -> VariantDraft {
        let excerpt: String = text.chars().take(120).collect();
        VariantDraft {
            title: "Сгенерированный конспект".to_string(),
            markdown: format!("## {}\n\n- **{}**", variant.as_str(), excerpt.trim()),
            key_points: vec![format!("{} key point", variant.as_str())],
        }
    }

    fn default_quiz(question_count: u32) -> QuizDraft {
        QuizDraft {
            title: "Сгенерированный тест".to_string(),
            description: Some("Проверьте себя".to_string()),
            instructions: None,
            questions: (1..=question_count)
                .map(|i| QuestionDraft {
                    question: format!("Вопрос {i}"),
                    answers: (0..4)
                        .map(|a| AnswerDraft {
                            text: format!("Ответ {a}"),
                            is_correct: a == 0,
                        })
                        .collect(),
                    explanation: None,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl AiBackend for MockAiBackend {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        _mime_type: &str,
    ) -> Result<TranscriptionOutput, AiError> {
        self.record("transcribe", None, filename);
        if let Some(err) = &self.config.transcription_failure {
            return Err(err.clone());
        }
        Ok(TranscriptionOutput {
            transcript: self
                .config
                .transcript
                .clone()
                .unwrap_or_else(|| format!("Транскрипт {} байт.", audio.len())),
            duration_sec: Some(1.0),
            language: Some("ru".to_string()),
        })
    }

    async fn generate_note_variant(
        &self,
        text: &str,
        variant: NoteVariant,
    ) -> Result<VariantDraft, AiError> {
        self.record("generate_note_variant", Some(variant), text);
        if let Some(err) = self.config.variant_failures.get(&variant) {
            return Err(err.clone());
        }
        Ok(self
            .config
            .variants
            .get(&variant)
            .cloned()
            .unwrap_or_else(|| Self::default_variant(text, variant)))
    }

    async fn generate_quiz(&self, text: &str, question_count: u32) -> Result<QuizDraft, AiError> {
        self.record("generate_quiz", None, text);
        if let Some(err) = &self.config.quiz_failure {
            return Err(err.clone());
        }
        Ok(self
            .config
            .quiz
            .clone()
            .unwrap_or_else(|| Self::default_quiz(question_count)))
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_variant_failure_only_affects_that_variant() {
        let backend = MockAiBackend::new()
            .with_variant_failure(NoteVariant::Full, AiError::transient("429"));

        assert!(backend
            .generate_note_variant("text", NoteVariant::Full)
            .await
            .is_err());
        assert!(backend
            .generate_note_variant("text", NoteVariant::Brief)
            .await
            .is_ok());
        assert_eq!(backend.call_count("generate_note_variant"), 2);
    }

    #[tokio::test]
    async fn test_default_quiz_honors_count() {
        let backend = MockAiBackend::new();
        let quiz = backend.generate_quiz("text", 3).await.unwrap();
        assert_eq!(quiz.questions.len(), 3);
        assert!(quiz.questions.iter().all(|q| q.answers.len() == 4));
    }

    #[tokio::test]
    async fn test_transcript_script() {
        let backend = MockAiBackend::new().with_transcript("Привет.");
        let out = backend
            .transcribe(vec![1, 2, 3], "a.mp3", "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(out.transcript, "Привет.");
        assert_eq!(backend.calls()[0].input, "a.mp3");
    }
}
