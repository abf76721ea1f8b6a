//! Job status handlers.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use conspectium_core::{GenerationJob, JobKind, JobStatus};

use crate::auth::CurrentUser;
use crate::{ApiError, AppState};

/// Public view of a generation job.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub note_id: Option<Uuid>,
    pub quiz_id: Option<Uuid>,
    pub audio_source_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&GenerationJob> for JobView {
    fn from(job: &GenerationJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            status: job.status,
            note_id: job.note_id,
            quiz_id: job.quiz_id,
            audio_source_id: job.audio_source_id,
            error: job.error.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

/// `GET /api/jobs/:id`
pub async fn get_job(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    let job = state.service.get_job(owner, job_id).await?;
    Ok(Json(JobView::from(&job)))
}
