//! In-memory implementations of [`GenerationRepository`] and
//! [`StorageBackend`].
//!
//! Used by tests and by database-less local runs. Each method holds one lock
//! for its whole body, which gives the same all-or-nothing behavior as the
//! PostgreSQL transactions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use conspectium_core::{
    AudioSource, AudioStatus, Error, GenerationJob, GenerationRepository, JobFailure, JobStatus,
    Note, NoteStatus, NoteVariant, Quiz, QuizResult, QuizStatus, Result,
};

use crate::file_storage::StorageBackend;

#[derive(Default)]
struct State {
    audio_sources: HashMap<Uuid, AudioSource>,
    notes: HashMap<Uuid, Note>,
    quizzes: HashMap<Uuid, Quiz>,
    jobs: HashMap<Uuid, GenerationJob>,
    results: Vec<QuizResult>,
}

/// In-memory [`GenerationRepository`].
#[derive(Default)]
pub struct MemoryGenerationRepository {
    state: Mutex<State>,
}

impl MemoryGenerationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory repository lock poisoned".into()))
    }

    /// Quiz results recorded for a quiz, oldest first.
    pub fn quiz_results(&self, quiz_id: Uuid) -> Result<Vec<QuizResult>> {
        Ok(self
            .lock()?
            .results
            .iter()
            .filter(|r| r.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

fn insert_unique<T>(map: &mut HashMap<Uuid, T>, id: Uuid, value: T, what: &str) -> Result<()> {
    if map.contains_key(&id) {
        return Err(Error::Conflict(format!("{what} {id} already exists")));
    }
    map.insert(id, value);
    Ok(())
}

fn finish_job(state: &mut State, job: &GenerationJob) -> Result<()> {
    let stored = state
        .jobs
        .get_mut(&job.id)
        .ok_or_else(|| Error::NotFound(format!("job {}", job.id)))?;
    stored.status = JobStatus::Completed;
    stored.prompt = job.prompt.clone();
    stored.response_payload = job.response_payload.clone();
    stored.error = None;
    stored.finished_at = Some(job.finished_at.unwrap_or_else(Utc::now));
    Ok(())
}

#[async_trait]
impl GenerationRepository for MemoryGenerationRepository {
    async fn get_audio_source(&self, id: Uuid) -> Result<Option<AudioSource>> {
        Ok(self.lock()?.audio_sources.get(&id).cloned())
    }

    async fn insert_audio_source(&self, audio: &AudioSource) -> Result<()> {
        let mut state = self.lock()?;
        insert_unique(&mut state.audio_sources, audio.id, audio.clone(), "audio source")
    }

    async fn save_audio_source(&self, audio: &AudioSource) -> Result<()> {
        let mut state = self.lock()?;
        let stored = state
            .audio_sources
            .get_mut(&audio.id)
            .ok_or_else(|| Error::NotFound(format!("audio source {}", audio.id)))?;
        stored.status = audio.status;
        stored.transcription = audio.transcription.clone();
        stored.duration_secs = audio.duration_secs;
        stored.metadata = audio.metadata.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.lock()?.notes.get(&id).cloned())
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        Ok(self.lock()?.quizzes.get(&id).cloned())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn insert_note_with_job(&self, note: &Note, job: &GenerationJob) -> Result<()> {
        let mut state = self.lock()?;
        if state.jobs.contains_key(&job.id) {
            return Err(Error::Conflict(format!("job {} already exists", job.id)));
        }
        insert_unique(&mut state.notes, note.id, note.clone(), "note")?;
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn insert_job(&self, job: &GenerationJob) -> Result<()> {
        let mut state = self.lock()?;
        insert_unique(&mut state.jobs, job.id, job.clone(), "job")
    }

    async fn insert_quiz_with_job(&self, quiz: &Quiz, job: &GenerationJob) -> Result<()> {
        let mut state = self.lock()?;
        if state.jobs.contains_key(&job.id) {
            return Err(Error::Conflict(format!("job {} already exists", job.id)));
        }
        insert_unique(&mut state.quizzes, quiz.id, quiz.clone(), "quiz")?;
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn mark_job_running(&self, job_id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        if job.status != JobStatus::Pending {
            return Err(Error::Job(format!(
                "job {} is {}, expected pending",
                job_id, job.status
            )));
        }
        job.status = JobStatus::Running;
        job.started_at = Some(started_at);
        Ok(())
    }

    async fn complete_note_job(&self, job: &GenerationJob, note: &Note) -> Result<()> {
        let mut state = self.lock()?;
        if !state.jobs.contains_key(&job.id) {
            return Err(Error::NotFound(format!("job {}", job.id)));
        }
        let stored = state
            .notes
            .get_mut(&note.id)
            .ok_or_else(|| Error::NotFound(format!("note {}", note.id)))?;

        // Same column semantics as the SQL update: variants are COALESCEd.
        let mut merged = note.clone();
        for variant in NoteVariant::ALL {
            if !merged.has_variant(variant) {
                if let Some(existing) = stored.variant_markdown(variant) {
                    let existing = existing.to_string();
                    merged.set_variant(variant, &existing);
                }
            }
        }
        merged.created_at = stored.created_at;
        merged.updated_at = Utc::now();
        *stored = merged;

        finish_job(&mut state, job)
    }

    async fn complete_quiz_job(&self, job: &GenerationJob, quiz: &Quiz) -> Result<()> {
        let mut state = self.lock()?;
        if !state.jobs.contains_key(&job.id) {
            return Err(Error::NotFound(format!("job {}", job.id)));
        }
        let stored = state
            .quizzes
            .get_mut(&quiz.id)
            .ok_or_else(|| Error::NotFound(format!("quiz {}", quiz.id)))?;

        let created_at = stored.created_at;
        *stored = quiz.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();

        finish_job(&mut state, job)
    }

    async fn fail_job(&self, failure: &JobFailure) -> Result<()> {
        let mut state = self.lock()?;

        let job = state
            .jobs
            .get_mut(&failure.job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", failure.job_id)))?;
        job.status = JobStatus::Failed;
        job.error = Some(failure.error.clone());
        job.finished_at = Some(failure.finished_at);

        if let Some(note) = failure.note_id.and_then(|id| state.notes.get_mut(&id)) {
            note.status = NoteStatus::Failed;
            note.updated_at = failure.finished_at;
        }
        if let Some(quiz) = failure.quiz_id.and_then(|id| state.quizzes.get_mut(&id)) {
            quiz.status = QuizStatus::Failed;
            quiz.updated_at = failure.finished_at;
        }
        if let Some(audio) = failure
            .audio_source_id
            .and_then(|id| state.audio_sources.get_mut(&id))
        {
            if audio.status != AudioStatus::Pending {
                audio.status = AudioStatus::Failed;
                audio.updated_at = failure.finished_at;
            }
        }
        Ok(())
    }

    async fn record_quiz_result(&self, result: &QuizResult) -> Result<()> {
        self.lock()?.results.push(result.clone());
        Ok(())
    }
}

/// In-memory [`StorageBackend`].
#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| Error::Internal("memory storage lock poisoned".into()))
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("stored file {key}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }
}
