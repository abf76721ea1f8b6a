//! Audio source persistence.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use conspectium_core::{AudioSource, AudioStatus, Error, Result};

use crate::jobs::PgGenerationRepository;

pub(crate) const AUDIO_COLUMNS: &str = "id, owner_id, kind, original_filename, mime_type, \
     file_ref, file_size, duration_secs, status, transcription, metadata, created_at, updated_at";

pub(crate) fn parse_audio_row(row: &PgRow) -> Result<AudioSource> {
    Ok(AudioSource {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        kind: row.get::<String, _>("kind").parse()?,
        original_filename: row.get("original_filename"),
        mime_type: row.get("mime_type"),
        file_ref: row.get("file_ref"),
        file_size: row.get("file_size"),
        duration_secs: row.get("duration_secs"),
        status: row.get::<String, _>("status").parse()?,
        transcription: row.get("transcription"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl PgGenerationRepository {
    pub(crate) async fn fetch_audio_source(&self, id: Uuid) -> Result<Option<AudioSource>> {
        let row = sqlx::query(&format!(
            "SELECT {AUDIO_COLUMNS} FROM audio_sources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(parse_audio_row).transpose()
    }

    pub(crate) async fn insert_audio_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        audio: &AudioSource,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audio_sources (
                id, owner_id, kind, original_filename, mime_type, file_ref,
                file_size, duration_secs, status, transcription, metadata,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(audio.id)
        .bind(audio.owner_id)
        .bind(audio.kind.as_str())
        .bind(&audio.original_filename)
        .bind(&audio.mime_type)
        .bind(&audio.file_ref)
        .bind(audio.file_size)
        .bind(audio.duration_secs)
        .bind(audio.status.as_str())
        .bind(&audio.transcription)
        .bind(&audio.metadata)
        .bind(audio.created_at)
        .bind(audio.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Write the fields the pipeline mutates: status, transcript, duration
    /// and metadata.
    pub(crate) async fn save_audio_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        audio: &AudioSource,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE audio_sources
               SET status = $2,
                   transcription = $3,
                   duration_secs = $4,
                   metadata = $5,
                   updated_at = $6
             WHERE id = $1
            "#,
        )
        .bind(audio.id)
        .bind(audio.status.as_str())
        .bind(&audio.transcription)
        .bind(audio.duration_secs)
        .bind(&audio.metadata)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("audio source {}", audio.id)));
        }
        Ok(())
    }

    /// Mark an audio source failed unless it sits in `pending`, the open
    /// retry window after a transient transcription failure.
    pub(crate) async fn fail_audio_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE audio_sources SET status = $2, updated_at = $3 WHERE id = $1 AND status <> $4",
        )
        .bind(id)
        .bind(AudioStatus::Failed.as_str())
        .bind(at)
        .bind(AudioStatus::Pending.as_str())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
