//! Generation job persistence and the PostgreSQL [`GenerationRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use conspectium_core::{
    AudioSource, Error, GenerationJob, GenerationRepository, JobFailure, JobStatus, Note, Quiz,
    QuizResult, Result,
};

const JOB_COLUMNS: &str = "id, owner_id, kind, status, note_id, quiz_id, audio_source_id, \
     options, prompt, response_payload, error, created_at, started_at, finished_at";

/// PostgreSQL implementation of [`GenerationRepository`].
///
/// Multi-entity writes run inside one `Transaction<Postgres>`, composed from
/// the `_tx` helpers in the sibling modules.
#[derive(Clone)]
pub struct PgGenerationRepository {
    pub(crate) pool: Pool<Postgres>,
}

impl PgGenerationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_job_row(row: &PgRow) -> Result<GenerationJob> {
        Ok(GenerationJob {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            kind: row.get::<String, _>("kind").parse()?,
            status: row.get::<String, _>("status").parse()?,
            note_id: row.get("note_id"),
            quiz_id: row.get("quiz_id"),
            audio_source_id: row.get("audio_source_id"),
            options: row.get("options"),
            prompt: row.get("prompt"),
            response_payload: row.get("response_payload"),
            error: row.get("error"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
        })
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }

    async fn insert_job_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job: &GenerationJob,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_jobs (
                id, owner_id, kind, status, note_id, quiz_id, audio_source_id,
                options, prompt, response_payload, error, created_at, started_at,
                finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.note_id)
        .bind(job.quiz_id)
        .bind(job.audio_source_id)
        .bind(&job.options)
        .bind(&job.prompt)
        .bind(&job.response_payload)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Write the terminal fields of a successful job.
    async fn finish_job_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job: &GenerationJob,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE generation_jobs
               SET status = $2,
                   prompt = $3,
                   response_payload = $4,
                   error = NULL,
                   finished_at = $5
             WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(JobStatus::Completed.as_str())
        .bind(&job.prompt)
        .bind(&job.response_payload)
        .bind(job.finished_at.unwrap_or_else(Utc::now))
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl GenerationRepository for PgGenerationRepository {
    async fn get_audio_source(&self, id: Uuid) -> Result<Option<AudioSource>> {
        self.fetch_audio_source(id).await
    }

    async fn insert_audio_source(&self, audio: &AudioSource) -> Result<()> {
        let mut tx = self.begin().await?;
        self.insert_audio_source_tx(&mut tx, audio).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn save_audio_source(&self, audio: &AudioSource) -> Result<()> {
        let mut tx = self.begin().await?;
        self.save_audio_source_tx(&mut tx, audio).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        self.fetch_note(id).await
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        self.fetch_quiz(id).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM generation_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_job_row).transpose()
    }

    async fn insert_note_with_job(&self, note: &Note, job: &GenerationJob) -> Result<()> {
        let mut tx = self.begin().await?;
        self.insert_note_tx(&mut tx, note).await?;
        self.insert_job_tx(&mut tx, job).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn insert_job(&self, job: &GenerationJob) -> Result<()> {
        let mut tx = self.begin().await?;
        self.insert_job_tx(&mut tx, job).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn insert_quiz_with_job(&self, quiz: &Quiz, job: &GenerationJob) -> Result<()> {
        let mut tx = self.begin().await?;
        self.insert_quiz_tx(&mut tx, quiz).await?;
        self.replace_questions_tx(&mut tx, quiz.id, &quiz.questions)
            .await?;
        self.insert_job_tx(&mut tx, job).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn mark_job_running(&self, job_id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE generation_jobs SET status = $2, started_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Running.as_str())
        .bind(started_at)
        .bind(JobStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return match self.get_job(job_id).await? {
                Some(job) => Err(Error::Job(format!(
                    "job {} is {}, expected pending",
                    job_id, job.status
                ))),
                None => Err(Error::NotFound(format!("job {}", job_id))),
            };
        }
        debug!(%job_id, "Job marked running");
        Ok(())
    }

    async fn complete_note_job(&self, job: &GenerationJob, note: &Note) -> Result<()> {
        let mut tx = self.begin().await?;
        self.update_note_tx(&mut tx, note).await?;
        self.finish_job_tx(&mut tx, job).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn complete_quiz_job(&self, job: &GenerationJob, quiz: &Quiz) -> Result<()> {
        let mut tx = self.begin().await?;
        self.update_quiz_tx(&mut tx, quiz).await?;
        self.replace_questions_tx(&mut tx, quiz.id, &quiz.questions)
            .await?;
        self.finish_job_tx(&mut tx, job).await?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn fail_job(&self, failure: &JobFailure) -> Result<()> {
        let mut tx = self.begin().await?;

        sqlx::query(
            "UPDATE generation_jobs SET status = $2, error = $3, finished_at = $4 WHERE id = $1",
        )
        .bind(failure.job_id)
        .bind(JobStatus::Failed.as_str())
        .bind(&failure.error)
        .bind(failure.finished_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if let Some(note_id) = failure.note_id {
            self.fail_note_tx(&mut tx, note_id, failure.finished_at).await?;
        }
        if let Some(quiz_id) = failure.quiz_id {
            self.fail_quiz_tx(&mut tx, quiz_id, failure.finished_at).await?;
        }
        if let Some(audio_id) = failure.audio_source_id {
            let updated = self
                .fail_audio_source_tx(&mut tx, audio_id, failure.finished_at)
                .await?;
            if updated == 0 {
                debug!(%audio_id, "Audio source left pending for retry");
            }
        }

        tx.commit().await.map_err(Error::Database)
    }

    async fn record_quiz_result(&self, result: &QuizResult) -> Result<()> {
        self.insert_quiz_result(result).await
    }
}
