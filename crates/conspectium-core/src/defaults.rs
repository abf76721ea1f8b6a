//! Centralized default constants for Conspectium.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// NOTE GENERATION
// =============================================================================

/// Maximum length of the plain-text summary derived from a variant.
pub const SUMMARY_MAX_LENGTH: usize = 400;

/// Characters of raw transcript used as summary when no variant exists.
pub const TRANSCRIPT_SUMMARY_FALLBACK_CHARS: usize = 200;

/// Model tag recorded on notes and quizzes built by the offline fallbacks.
pub const OFFLINE_MODEL_TAG: &str = "offline-fallback";

/// Title used when neither the note nor its audio source has one.
pub const DEFAULT_NOTE_TITLE: &str = "Черновик конспекта";

// =============================================================================
// OFFLINE FALLBACK
// =============================================================================

/// Sentences used for the offline summary.
pub const OFFLINE_SUMMARY_SENTENCES: usize = 5;

/// Maximum key points extracted by the offline summarizer.
pub const OFFLINE_KEY_POINTS: usize = 5;

/// Maximum characters per offline key point.
pub const OFFLINE_KEY_POINT_CHARS: usize = 200;

/// Maximum questions produced by the offline quiz builder.
pub const OFFLINE_QUIZ_QUESTIONS: usize = 5;

// =============================================================================
// QUIZ
// =============================================================================

/// Questions requested when the caller does not specify a count.
pub const DEFAULT_QUESTION_COUNT: u32 = 10;

/// Upper bound for a requested question count.
pub const MAX_QUESTION_COUNT: u32 = 50;

/// Quiz title when neither the AI nor the note supplies one.
pub const DEFAULT_QUIZ_TITLE: &str = "Новый тест";

// =============================================================================
// AI BACKEND
// =============================================================================

/// Default OpenAI-compatible API base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default generation model for notes and quizzes.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Default speech-to-text model.
pub const TRANSCRIBE_MODEL: &str = "whisper-1";

/// Sampling temperature for structured JSON generation.
pub const GEN_TEMPERATURE: f32 = 0.3;

/// HTTP timeout for AI requests, in seconds. Transcription of long audio
/// is the slowest call.
pub const AI_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Maximum jobs processed concurrently by the worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Capacity of the dispatch channel feeding the worker.
pub const JOB_QUEUE_CAPACITY: usize = 256;

/// Capacity of the worker event broadcast channel.
pub const WORKER_EVENT_CAPACITY: usize = 256;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP listen port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum audio upload size in megabytes.
pub const MAX_UPLOAD_SIZE_MB: usize = 50;

/// Default directory for stored audio blobs.
pub const AUDIO_STORAGE_DIR: &str = "var/audio";
