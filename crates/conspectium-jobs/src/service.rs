//! The generation pipeline.
//!
//! [`GenerationService`] creates jobs for the request layer and processes
//! them in the background. Every dependency is injected at construction;
//! the service holds no state across jobs.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use conspectium_core::{
    defaults, new_v7, score_submission, AiError, AudioSource, AudioSourceKind, AudioStatus,
    Error, GenerationJob, GenerationRepository, JobFailure, JobKind, JobMode, JobStatus, Note,
    NoteJobOptions, NoteStatus, NoteVariant, PipelineConfig, Quiz, QuizJobOptions, QuizResult,
    QuizStatus, Result,
};
use conspectium_db::{compute_content_hash, generate_storage_path, StorageBackend};
use conspectium_inference::AiBackend;

use crate::fallback::{build_local_note, build_local_quiz};
use crate::note_generator::{
    apply_variants, generate_variants, merge_raw_response, refresh_summary, GenerationMode,
};
use crate::policy::{FailurePolicy, FailureResponse, Operation};
use crate::quiz_generator::{apply_quiz, fallback_title, QuizGeneration};

/// Job error for a transient quiz generation failure in production.
pub const QUIZ_RETRY_HINT: &str = "Quiz generation service is overloaded; try again in a minute";

/// Request to generate a new note.
#[derive(Debug, Clone, Default)]
pub struct CreateNoteRequest {
    pub audio_source_id: Option<Uuid>,
    pub initial_text: Option<String>,
    pub title: Option<String>,
    /// Requested variants. Empty means `[brief]`.
    pub variants: Vec<NoteVariant>,
}

/// An uploaded audio blob, before it is stored.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub kind: AudioSourceKind,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// Generation pipeline with injected persistence, storage and AI backends.
pub struct GenerationService {
    pub(crate) repo: Arc<dyn GenerationRepository>,
    pub(crate) storage: Arc<dyn StorageBackend>,
    pub(crate) ai: Arc<dyn AiBackend>,
    /// Backend for jobs without audio. Defaults to `ai`.
    pub(crate) text_ai: Arc<dyn AiBackend>,
    pub(crate) config: PipelineConfig,
    pub(crate) policy: FailurePolicy,
}

impl GenerationService {
    pub fn new(
        repo: Arc<dyn GenerationRepository>,
        storage: Arc<dyn StorageBackend>,
        ai: Arc<dyn AiBackend>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            text_ai: ai.clone(),
            ai,
            policy: FailurePolicy::from_config(&config),
            config,
        }
    }

    /// Use a separate backend for text-only note jobs.
    pub fn with_text_ai(mut self, text_ai: Arc<dyn AiBackend>) -> Self {
        self.text_ai = text_ai;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn GenerationRepository> {
        &self.repo
    }

    // =========================================================================
    // OWNED LOOKUPS
    // =========================================================================

    /// Fetch a note owned by `owner`. Foreign notes read as missing.
    pub async fn get_note(&self, owner: Uuid, note_id: Uuid) -> Result<Note> {
        self.repo
            .get_note(note_id)
            .await?
            .filter(|n| n.owner_id == owner)
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))
    }

    pub async fn get_quiz(&self, owner: Uuid, quiz_id: Uuid) -> Result<Quiz> {
        self.repo
            .get_quiz(quiz_id)
            .await?
            .filter(|q| q.owner_id == owner)
            .ok_or_else(|| Error::NotFound(format!("quiz {quiz_id}")))
    }

    pub async fn get_job(&self, owner: Uuid, job_id: Uuid) -> Result<GenerationJob> {
        self.repo
            .get_job(job_id)
            .await?
            .filter(|j| j.owner_id == owner)
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))
    }

    /// Fetch an audio source the caller may generate from.
    async fn usable_audio_source(&self, owner: Uuid, audio_id: Uuid) -> Result<AudioSource> {
        let audio = self
            .repo
            .get_audio_source(audio_id)
            .await?
            .filter(|a| a.owner_id == owner)
            .ok_or_else(|| Error::NotFound(format!("audio source {audio_id}")))?;

        if audio.status == AudioStatus::Failed {
            return Err(Error::Forbidden(
                "audio processing failed; upload the file again".into(),
            ));
        }
        if audio.cached_transcript().is_none() && audio.file_ref.is_none() {
            return Err(Error::Forbidden(
                "audio source is not ready for processing".into(),
            ));
        }
        Ok(audio)
    }

    // =========================================================================
    // AUDIO
    // =========================================================================

    /// Store an uploaded blob and register it as a `pending` audio source.
    #[instrument(skip(self, upload), fields(subsystem = "jobs", component = "pipeline", op = "upload_audio", size = upload.data.len()))]
    pub async fn upload_audio(&self, owner: Uuid, upload: AudioUpload) -> Result<AudioSource> {
        if upload.data.is_empty() {
            return Err(Error::Validation("uploaded audio file is empty".into()));
        }

        let mut audio = AudioSource::new(owner, upload.kind);
        let extension = upload.filename.as_deref().and_then(file_extension);
        let key = generate_storage_path(&owner, &audio.id, extension.as_deref());

        self.storage.write(&key, &upload.data).await?;

        audio.file_ref = Some(key.clone());
        audio.file_size = Some(upload.data.len() as i64);
        audio.original_filename = upload.filename;
        audio.mime_type = upload.mime_type;
        audio.set_metadata("content_hash", json!(compute_content_hash(&upload.data)));

        if let Err(e) = self.repo.insert_audio_source(&audio).await {
            if let Err(cleanup) = self.storage.delete(&key).await {
                warn!(error = %cleanup, key = %key, "Failed to remove orphaned audio blob");
            }
            return Err(e);
        }

        info!(audio_source_id = %audio.id, "Audio source registered");
        Ok(audio)
    }

    // =========================================================================
    // NOTE JOBS
    // =========================================================================

    /// Create a note in `processing` and the `create` job that generates it.
    #[instrument(skip(self, request), fields(subsystem = "jobs", component = "pipeline", op = "create_note_job"))]
    pub async fn create_note_job(
        &self,
        owner: Uuid,
        request: CreateNoteRequest,
    ) -> Result<GenerationJob> {
        let has_text = request
            .initial_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if request.audio_source_id.is_none() && !has_text {
            return Err(Error::Validation(
                "an audio source or initial text is required".into(),
            ));
        }

        let audio_source_id = match request.audio_source_id {
            Some(id) => Some(self.usable_audio_source(owner, id).await?.id),
            None => None,
        };

        let options = NoteJobOptions::new(&request.variants, JobMode::Create);

        let mut note = Note::new(owner);
        note.audio_source_id = audio_source_id;
        note.title = request
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        note.input_text = request.initial_text.filter(|t| !t.trim().is_empty());
        note.status = NoteStatus::Processing;

        let mut job = GenerationJob::new(owner, JobKind::Note);
        job.note_id = Some(note.id);
        job.audio_source_id = audio_source_id;
        job.options = Some(options.to_payload());

        self.repo.insert_note_with_job(&note, &job).await?;

        info!(
            job_id = %job.id,
            note_id = %note.id,
            variants = ?options.variants,
            "Note job created"
        );
        Ok(job)
    }

    /// Create an `append` job that adds one variant to an existing note.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "pipeline", op = "create_note_variant_job"))]
    pub async fn create_note_variant_job(
        &self,
        owner: Uuid,
        note_id: Uuid,
        variant: NoteVariant,
    ) -> Result<GenerationJob> {
        let note = self.get_note(owner, note_id).await?;
        if note.has_variant(variant) {
            return Err(Error::Conflict(format!(
                "variant {variant} already exists for note {note_id}"
            )));
        }

        let mut job = GenerationJob::new(owner, JobKind::Note);
        job.note_id = Some(note.id);
        job.audio_source_id = note.audio_source_id;
        job.options = Some(NoteJobOptions::new(&[variant], JobMode::Append).to_payload());

        self.repo.insert_job(&job).await?;

        info!(job_id = %job.id, note_id = %note.id, variant = %variant, "Variant job created");
        Ok(job)
    }

    /// Run a note job to completion or failure.
    ///
    /// Jobs that are missing or no longer pending are skipped. On failure the
    /// job is marked failed in a fresh unit of work and the error returned.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "pipeline", op = "process_job"))]
    pub async fn process_job(&self, job_id: Uuid) -> Result<()> {
        let Some(mut job) = self.claim(job_id, JobKind::Note).await? else {
            return Ok(());
        };
        let options = job.note_options();

        match self.run_note_job(&mut job, &options).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let create = options.mode == JobMode::Create;
                self.record_failure(
                    &job,
                    &e,
                    job.note_id.filter(|_| create),
                    None,
                    job.audio_source_id.filter(|_| create),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_note_job(&self, job: &mut GenerationJob, options: &NoteJobOptions) -> Result<()> {
        let note_id = job
            .note_id
            .ok_or_else(|| Error::Job(format!("note job {} has no note", job.id)))?;
        let mut note = self
            .repo
            .get_note(note_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))?;

        let transcript = self.obtain_transcript(job, &note).await?;

        let ai = if job.audio_source_id.is_some() {
            &self.ai
        } else {
            &self.text_ai
        };

        let generation = match generate_variants(ai.as_ref(), &transcript.text, &options.variants).await {
            Ok(generation) => generation,
            Err(err) => match self.policy.resolve(Operation::NoteGeneration, err.class) {
                FailureResponse::OfflineFallback => {
                    warn!(
                        job_id = %job.id,
                        note_id = %note.id,
                        error = %err,
                        "Note generation failed, using offline fallback"
                    );
                    build_local_note(
                        &note,
                        &transcript.text,
                        &err.message,
                        transcript.audio.as_ref(),
                        &options.variants,
                    )
                }
                response => return Err(self.escalate(Operation::NoteGeneration, response, err)),
            },
        };

        let create = options.mode == JobMode::Create;
        apply_variants(&mut note, &generation, create);
        refresh_summary(
            &mut note,
            Some(&transcript.text),
            self.config.summary_max_length,
        );

        let model = if generation.is_offline() {
            defaults::OFFLINE_MODEL_TAG
        } else {
            ai.model_name()
        };
        note.model_used = Some(model.to_string());

        let response = generation.to_payload();
        note.raw_response = Some(merge_raw_response(note.raw_response.as_ref(), &response));

        let now = Utc::now();
        if create {
            note.status = NoteStatus::Ready;
            note.generated_at = Some(now);
        }

        job.status = JobStatus::Completed;
        job.response_payload = Some(response);
        job.finished_at = Some(now);
        self.repo.complete_note_job(job, &note).await?;

        info!(
            job_id = %job.id,
            note_id = %note.id,
            model = model,
            mode = generation.mode.as_str(),
            duration_ms = job_duration_ms(job),
            "Note job completed"
        );
        Ok(())
    }

    // =========================================================================
    // QUIZ JOBS
    // =========================================================================

    /// Create a quiz in `processing` and the job that generates it.
    ///
    /// The note must belong to `owner` and be `ready`.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "pipeline", op = "create_quiz_job"))]
    pub async fn create_quiz_job(
        &self,
        owner: Uuid,
        note_id: Uuid,
        question_count: Option<u32>,
    ) -> Result<GenerationJob> {
        let question_count = match question_count {
            None => self.config.default_question_count,
            Some(count) if (1..=defaults::MAX_QUESTION_COUNT).contains(&count) => count,
            Some(count) => {
                return Err(Error::Validation(format!(
                    "question_count must be between 1 and {}, got {count}",
                    defaults::MAX_QUESTION_COUNT
                )))
            }
        };

        let note = self.get_note(owner, note_id).await?;
        if note.status != NoteStatus::Ready {
            return Err(Error::NotReady(format!(
                "note {note_id} is still {}; wait for generation to finish",
                note.status
            )));
        }

        let mut quiz = Quiz::new(owner, fallback_title(&note));
        quiz.note_id = Some(note.id);

        let mut job = GenerationJob::new(owner, JobKind::Quiz);
        job.note_id = Some(note.id);
        job.quiz_id = Some(quiz.id);
        job.options = Some(QuizJobOptions { question_count }.to_payload());

        self.repo.insert_quiz_with_job(&quiz, &job).await?;

        info!(job_id = %job.id, quiz_id = %quiz.id, question_count, "Quiz job created");
        Ok(job)
    }

    /// Run a quiz job to completion or failure.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "pipeline", op = "process_quiz_job"))]
    pub async fn process_quiz_job(&self, job_id: Uuid) -> Result<()> {
        let Some(mut job) = self.claim(job_id, JobKind::Quiz).await? else {
            return Ok(());
        };

        match self.run_quiz_job(&mut job).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.record_failure(&job, &e, None, job.quiz_id, None).await;
                Err(e)
            }
        }
    }

    async fn run_quiz_job(&self, job: &mut GenerationJob) -> Result<()> {
        let note_id = job
            .note_id
            .ok_or_else(|| Error::Job(format!("quiz job {} has no note", job.id)))?;
        let quiz_id = job
            .quiz_id
            .ok_or_else(|| Error::Job(format!("quiz job {} has no quiz", job.id)))?;

        let note = self
            .repo
            .get_note(note_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))?;
        let mut quiz = self
            .repo
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("quiz {quiz_id}")))?;

        if note.status != NoteStatus::Ready {
            return Err(Error::NotReady(format!("note {note_id} is still processing")));
        }

        let options = job.quiz_options();
        let text = note.summary.as_deref().unwrap_or_default();

        let generation = match self.ai.generate_quiz(text, options.question_count).await {
            Ok(draft) => QuizGeneration {
                draft,
                mode: GenerationMode::Ai,
                error: None,
            },
            Err(err) => match self.policy.resolve(Operation::QuizGeneration, err.class) {
                FailureResponse::OfflineFallback => {
                    warn!(
                        job_id = %job.id,
                        quiz_id = %quiz.id,
                        error = %err,
                        "Quiz generation failed, using offline fallback"
                    );
                    build_local_quiz(&note, &err.message)
                }
                response => return Err(self.escalate(Operation::QuizGeneration, response, err)),
            },
        };

        let model = if generation.is_offline() {
            defaults::OFFLINE_MODEL_TAG
        } else {
            self.ai.model_name()
        };
        apply_quiz(&mut quiz, &note, &generation, model);

        job.status = JobStatus::Completed;
        job.response_payload = quiz.raw_response.clone();
        job.finished_at = Some(Utc::now());
        self.repo.complete_quiz_job(job, &quiz).await?;

        info!(
            job_id = %job.id,
            quiz_id = %quiz.id,
            questions = quiz.questions.len(),
            model = model,
            duration_ms = job_duration_ms(job),
            "Quiz job completed"
        );
        Ok(())
    }

    /// Score a submission against a ready quiz and record the result.
    #[instrument(skip(self, answer_ids), fields(subsystem = "jobs", component = "pipeline", op = "submit_quiz"))]
    pub async fn submit_quiz(
        &self,
        owner: Uuid,
        quiz_id: Uuid,
        answer_ids: Vec<Uuid>,
    ) -> Result<QuizResult> {
        let quiz = self.get_quiz(owner, quiz_id).await?;
        if quiz.status != QuizStatus::Ready {
            return Err(Error::NotReady(format!("quiz {quiz_id} is {}", quiz.status)));
        }

        let summary = score_submission(&quiz.questions, &answer_ids);
        let result = QuizResult {
            id: new_v7(),
            quiz_id,
            user_id: owner,
            score: summary.score,
            correct_answers: summary.correct_answers,
            total_questions: summary.total_questions,
            answers_payload: json!(answer_ids),
            created_at: Utc::now(),
        };
        self.repo.record_quiz_result(&result).await?;

        debug!(quiz_id = %quiz_id, score = result.score, "Quiz result recorded");
        Ok(result)
    }

    // =========================================================================
    // LIFECYCLE HELPERS
    // =========================================================================

    /// Load a job and move it `pending -> running` in its own unit of work.
    async fn claim(&self, job_id: Uuid, kind: JobKind) -> Result<Option<GenerationJob>> {
        let Some(mut job) = self.repo.get_job(job_id).await? else {
            warn!(job_id = %job_id, "Job not found, skipping");
            return Ok(None);
        };
        if job.kind != kind {
            return Err(Error::Job(format!(
                "job {job_id} is a {} job, expected {kind}",
                job.kind
            )));
        }
        if job.status != JobStatus::Pending {
            info!(job_id = %job_id, status = %job.status, "Job is not pending, skipping");
            return Ok(None);
        }

        let started_at = Utc::now();
        self.repo.mark_job_running(job_id, started_at).await?;
        job.status = JobStatus::Running;
        job.started_at = Some(started_at);

        info!(job_id = %job_id, kind = %kind, "Job started");
        Ok(Some(job))
    }

    /// Turn an AI failure into the job error the policy asks for.
    fn escalate(&self, operation: Operation, response: FailureResponse, err: AiError) -> Error {
        match (response, operation) {
            (FailureResponse::FailWithRetryHint, Operation::QuizGeneration) => {
                AiError::transient(QUIZ_RETRY_HINT).into()
            }
            _ => err.into(),
        }
    }

    /// Mark a job failed and cascade to the given entities.
    ///
    /// A failure here is logged, never returned: the job error is what
    /// the caller needs to see.
    async fn record_failure(
        &self,
        job: &GenerationJob,
        err: &Error,
        note_id: Option<Uuid>,
        quiz_id: Option<Uuid>,
        audio_source_id: Option<Uuid>,
    ) {
        let failure = JobFailure {
            job_id: job.id,
            error: err.to_string(),
            finished_at: Utc::now(),
            note_id,
            quiz_id,
            audio_source_id,
        };

        match self.repo.fail_job(&failure).await {
            Ok(()) => warn!(
                job_id = %job.id,
                kind = %job.kind,
                error = %err,
                "Job failed"
            ),
            Err(write_err) => error!(
                job_id = %job.id,
                error = %err,
                write_error = %write_err,
                "Failed to record job failure"
            ),
        }
    }
}

fn job_duration_ms(job: &GenerationJob) -> Option<i64> {
    match (job.started_at, job.finished_at) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
        _ => None,
    }
}

/// Lowercase alphanumeric extension of a filename, if it has a sane one.
fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}
