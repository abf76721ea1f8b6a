//! Conspect (note) handlers.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conspectium_core::{Note, NoteStatus, NoteVariant};
use conspectium_jobs::CreateNoteRequest;

use crate::auth::CurrentUser;
use crate::handlers::{accept_job, JobView};
use crate::{ApiError, AppState};

/// Body of `POST /api/conspects`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateConspectBody {
    pub audio_source_id: Option<Uuid>,
    /// Text to summarize when there is no audio.
    pub text: Option<String>,
    pub title: Option<String>,
    /// Variant names: `full`, `brief`, `compressed`. Defaults to `brief`.
    #[serde(default)]
    pub variants: Vec<String>,
}

/// Body of `POST /api/conspects/:id/variants`.
#[derive(Debug, Deserialize)]
pub struct AddVariantBody {
    pub variant: String,
}

/// Public view of a note.
#[derive(Debug, Serialize)]
pub struct ConspectView {
    pub id: Uuid,
    pub audio_source_id: Option<Uuid>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub full_markdown: Option<String>,
    pub brief_markdown: Option<String>,
    pub compressed_markdown: Option<String>,
    pub keywords: Vec<String>,
    pub status: NoteStatus,
    pub model_used: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for ConspectView {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            audio_source_id: note.audio_source_id,
            title: note.title,
            summary: note.summary,
            full_markdown: note.full_markdown,
            brief_markdown: note.brief_markdown,
            compressed_markdown: note.compressed_markdown,
            keywords: note.keywords,
            status: note.status,
            model_used: note.model_used,
            generated_at: note.generated_at,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

fn parse_variant(name: &str) -> Result<NoteVariant, ApiError> {
    NoteVariant::from_str(name.trim().to_lowercase().as_str())
        .map_err(|_| ApiError::BadRequest(format!("unknown note variant: {}", name)))
}

/// `POST /api/conspects`: start generating a note. Answers 202 with the job.
pub async fn create_conspect(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Json(body): Json<CreateConspectBody>,
) -> Result<(StatusCode, Json<JobView>), ApiError> {
    let variants = body
        .variants
        .iter()
        .map(|v| parse_variant(v))
        .collect::<Result<Vec<_>, _>>()?;

    let job = state
        .service
        .create_note_job(
            owner,
            CreateNoteRequest {
                audio_source_id: body.audio_source_id,
                initial_text: body.text,
                title: body.title,
                variants,
            },
        )
        .await?;

    Ok(accept_job(&state, &job).await)
}

/// `GET /api/conspects/:id`
pub async fn get_conspect(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<Json<ConspectView>, ApiError> {
    let note = state.service.get_note(owner, note_id).await?;
    Ok(Json(ConspectView::from(note)))
}

/// `POST /api/conspects/:id/variants`: generate one missing variant.
pub async fn add_variant(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Path(note_id): Path<Uuid>,
    Json(body): Json<AddVariantBody>,
) -> Result<(StatusCode, Json<JobView>), ApiError> {
    let variant = parse_variant(&body.variant)?;
    let job = state
        .service
        .create_note_variant_job(owner, note_id, variant)
        .await?;

    Ok(accept_job(&state, &job).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant() {
        assert_eq!(parse_variant("full").unwrap(), NoteVariant::Full);
        assert_eq!(parse_variant(" Brief ").unwrap(), NoteVariant::Brief);
        assert!(parse_variant("detailed").is_err());
    }
}
