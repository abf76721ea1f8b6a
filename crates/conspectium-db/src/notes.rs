//! Note persistence.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use conspectium_core::{Error, Note, NoteStatus, Result};

use crate::jobs::PgGenerationRepository;

pub(crate) const NOTE_COLUMNS: &str = "id, owner_id, audio_source_id, title, summary, \
     full_markdown, brief_markdown, compressed_markdown, keywords, input_text, status, \
     model_used, raw_response, generated_at, created_at, updated_at";

pub(crate) fn parse_note_row(row: &PgRow) -> Result<Note> {
    Ok(Note {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        audio_source_id: row.get("audio_source_id"),
        title: row.get("title"),
        summary: row.get("summary"),
        full_markdown: row.get("full_markdown"),
        brief_markdown: row.get("brief_markdown"),
        compressed_markdown: row.get("compressed_markdown"),
        keywords: row.get("keywords"),
        input_text: row.get("input_text"),
        status: row.get::<String, _>("status").parse()?,
        model_used: row.get("model_used"),
        raw_response: row.get("raw_response"),
        generated_at: row.get("generated_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl PgGenerationRepository {
    pub(crate) async fn fetch_note(&self, id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(parse_note_row).transpose()
    }

    pub(crate) async fn insert_note_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note: &Note,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notes (
                id, owner_id, audio_source_id, title, summary, full_markdown,
                brief_markdown, compressed_markdown, keywords, input_text, status,
                model_used, raw_response, generated_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(note.id)
        .bind(note.owner_id)
        .bind(note.audio_source_id)
        .bind(&note.title)
        .bind(&note.summary)
        .bind(&note.full_markdown)
        .bind(&note.brief_markdown)
        .bind(&note.compressed_markdown)
        .bind(&note.keywords)
        .bind(&note.input_text)
        .bind(note.status.as_str())
        .bind(&note.model_used)
        .bind(&note.raw_response)
        .bind(note.generated_at)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Write the generated fields of a note.
    ///
    /// Variant columns use `COALESCE(new, old)`, so a concurrent job that
    /// filled a different variant is not overwritten with NULL.
    pub(crate) async fn update_note_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note: &Note,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notes
               SET title = $2,
                   summary = $3,
                   full_markdown = COALESCE($4, full_markdown),
                   brief_markdown = COALESCE($5, brief_markdown),
                   compressed_markdown = COALESCE($6, compressed_markdown),
                   keywords = $7,
                   status = $8,
                   model_used = $9,
                   raw_response = $10,
                   generated_at = $11,
                   updated_at = $12
             WHERE id = $1
            "#,
        )
        .bind(note.id)
        .bind(&note.title)
        .bind(&note.summary)
        .bind(&note.full_markdown)
        .bind(&note.brief_markdown)
        .bind(&note.compressed_markdown)
        .bind(&note.keywords)
        .bind(note.status.as_str())
        .bind(&note.model_used)
        .bind(&note.raw_response)
        .bind(note.generated_at)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("note {}", note.id)));
        }
        Ok(())
    }

    pub(crate) async fn fail_note_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE notes SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(NoteStatus::Failed.as_str())
            .bind(at)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
