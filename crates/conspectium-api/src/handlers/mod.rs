//! HTTP handlers for conspectium-api.

pub mod audio;
pub mod conspects;
pub mod health;
pub mod jobs;
pub mod quizzes;

use axum::http::StatusCode;
use axum::Json;
use tracing::warn;

use conspectium_core::GenerationJob;

use crate::AppState;

pub use jobs::JobView;

/// Hand a freshly created job to the worker and answer `202 Accepted`.
///
/// The job row is already committed, so a dispatch failure is logged and the
/// job stays `pending` for the caller to observe.
pub(crate) async fn accept_job(
    state: &AppState,
    job: &GenerationJob,
) -> (StatusCode, Json<JobView>) {
    if let Err(e) = state.dispatcher.dispatch(job).await {
        warn!(
            subsystem = "api",
            job_id = %job.id,
            kind = %job.kind,
            error = %e,
            "Failed to dispatch job"
        );
    }
    (StatusCode::ACCEPTED, Json(JobView::from(job)))
}
