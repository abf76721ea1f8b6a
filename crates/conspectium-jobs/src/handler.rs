//! Job handlers for each job kind.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use conspectium_core::JobKind;

use crate::service::GenerationService;

/// Context provided to job handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: Uuid,
    pub kind: JobKind,
}

impl JobContext {
    pub fn new(job_id: Uuid, kind: JobKind) -> Self {
        Self { job_id, kind }
    }
}

/// Result of job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// The job failed; its failure is already recorded.
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn kind(&self) -> JobKind;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    fn can_handle(&self, kind: JobKind) -> bool {
        self.kind() == kind
    }
}

/// Runs note jobs through [`GenerationService::process_job`].
pub struct NoteJobHandler {
    service: Arc<GenerationService>,
}

impl NoteJobHandler {
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for NoteJobHandler {
    fn kind(&self) -> JobKind {
        JobKind::Note
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.service.process_job(ctx.job_id).await {
            Ok(()) => JobResult::Success,
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

/// Runs quiz jobs through [`GenerationService::process_quiz_job`].
pub struct QuizJobHandler {
    service: Arc<GenerationService>,
}

impl QuizJobHandler {
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for QuizJobHandler {
    fn kind(&self) -> JobKind {
        JobKind::Quiz
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.service.process_quiz_job(ctx.job_id).await {
            Ok(()) => JobResult::Success,
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

/// Handler that succeeds without doing anything. For tests.
pub struct NoOpHandler {
    kind: JobKind,
}

impl NoOpHandler {
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Success
    }
}
