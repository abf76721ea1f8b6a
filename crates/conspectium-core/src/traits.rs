//! Core traits for Conspectium abstractions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Persistence boundary of the generation pipeline.
///
/// Every method is one atomic unit of work: either all of its writes are
/// committed or none are. The pipeline never holds a transaction across an
/// AI call; it accumulates entity changes in memory and hands them to one of
/// the `complete_*`/`fail_job` methods at the end of a job.
#[async_trait]
pub trait GenerationRepository: Send + Sync {
    // Audio sources

    async fn get_audio_source(&self, id: Uuid) -> Result<Option<AudioSource>>;

    async fn insert_audio_source(&self, audio: &AudioSource) -> Result<()>;

    /// Persist status, transcription, duration and metadata of an audio
    /// source. Committed immediately so a cached transcript survives a later
    /// job failure.
    async fn save_audio_source(&self, audio: &AudioSource) -> Result<()>;

    // Notes and quizzes

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>>;

    /// Fetch a quiz with its questions and answers, ordered by position.
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>>;

    // Jobs

    async fn get_job(&self, id: Uuid) -> Result<Option<GenerationJob>>;

    /// Insert a draft note and the job that will generate it.
    async fn insert_note_with_job(&self, note: &Note, job: &GenerationJob) -> Result<()>;

    /// Insert a job for an existing entity (append-variant jobs).
    async fn insert_job(&self, job: &GenerationJob) -> Result<()>;

    /// Insert a processing quiz and the job that will generate it.
    async fn insert_quiz_with_job(&self, quiz: &Quiz, job: &GenerationJob) -> Result<()>;

    /// Transition a job `pending -> running`. Fails with `Error::Job` if the
    /// job is not pending.
    async fn mark_job_running(&self, job_id: Uuid, started_at: DateTime<Utc>) -> Result<()>;

    /// Write the generated note and mark its job completed.
    ///
    /// `job` carries the final status, response payload and finish time.
    async fn complete_note_job(&self, job: &GenerationJob, note: &Note) -> Result<()>;

    /// Replace the quiz's questions and answers with `quiz.questions`, write
    /// the quiz fields, and mark its job completed.
    async fn complete_quiz_job(&self, job: &GenerationJob, quiz: &Quiz) -> Result<()>;

    /// Mark a job failed and cascade to the entities named in `failure`.
    async fn fail_job(&self, failure: &JobFailure) -> Result<()>;

    // Results

    async fn record_quiz_result(&self, result: &QuizResult) -> Result<()>;
}
