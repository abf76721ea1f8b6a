//! Failure policy: what the pipeline does when an AI call fails.
//!
//! The response depends on three things only: the deployment environment,
//! the operation that failed, and the failure class reported by the AI
//! backend. Keeping the whole decision in one table makes the asymmetry
//! between transcription and generation explicit:
//!
//! | Operation | Environment | Transient | Permanent |
//! |-----------|-------------|-----------|-----------|
//! | transcription | any | audio back to `pending`, job fails with retry hint | audio `failed`, job fails |
//! | transcription | non-production, placeholder opted in | placeholder transcript | placeholder transcript |
//! | note generation | non-production | offline fallback | offline fallback |
//! | note generation | production | job fails | job fails |
//! | quiz generation | non-production | offline fallback | offline fallback |
//! | quiz generation | production | job fails with retry hint | job fails |

use conspectium_core::{AiFailureClass, Environment, PipelineConfig};

/// AI operation performed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Transcription,
    NoteGeneration,
    QuizGeneration,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Transcription => "transcription",
            Operation::NoteGeneration => "note_generation",
            Operation::QuizGeneration => "quiz_generation",
        }
    }
}

/// What to do with a failed AI call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResponse {
    /// Fail the job with the backend's error.
    Fail,
    /// Fail the job with a message inviting a later retry.
    FailWithRetryHint,
    /// Reset the audio source to `pending` and fail the job with a retry hint.
    ResetAudioToPending,
    /// Substitute the deterministic local generator and complete the job.
    OfflineFallback,
    /// Store the fixed placeholder transcript and continue.
    PlaceholderTranscript,
}

/// Resolves [`FailureResponse`]s for one pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    environment: Environment,
    transcription_placeholder: bool,
}

impl FailurePolicy {
    pub fn new(environment: Environment, transcription_placeholder: bool) -> Self {
        Self {
            environment,
            transcription_placeholder,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.environment, config.transcription_placeholder)
    }

    pub fn resolve(&self, operation: Operation, class: AiFailureClass) -> FailureResponse {
        use AiFailureClass::{Permanent, Transient};
        use FailureResponse::*;
        use Operation::*;

        let production = self.environment.is_production();
        match (operation, production, class) {
            (Transcription, false, _) if self.transcription_placeholder => PlaceholderTranscript,
            (Transcription, _, Transient) => ResetAudioToPending,
            (Transcription, _, Permanent) => Fail,

            (NoteGeneration, false, _) => OfflineFallback,
            (NoteGeneration, true, _) => Fail,

            (QuizGeneration, false, _) => OfflineFallback,
            (QuizGeneration, true, Transient) => FailWithRetryHint,
            (QuizGeneration, true, Permanent) => Fail,
        }
    }
}
