//! Job worker that runs generation jobs in the background.
//!
//! The request layer creates a job and hands its id to a [`JobDispatcher`].
//! The worker receives dispatches over a bounded channel and runs each one
//! through the handler registered for its kind, at most
//! `max_concurrent_jobs` at a time. There is no polling and no requeue: a
//! job that is never dispatched, or whose process dies mid-flight, stays
//! where it is.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use conspectium_core::{defaults, Error, GenerationJob, JobKind, Result};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Capacity of the dispatch queue.
    pub queue_capacity: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_QUEUE_CAPACITY` | `256` | Dispatches buffered before senders wait |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let queue_capacity = std::env::var("JOB_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_QUEUE_CAPACITY)
            .max(1);

        Self {
            max_concurrent_jobs,
            queue_capacity,
            enabled,
        }
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    JobStarted { job_id: Uuid, kind: JobKind },
    JobCompleted { job_id: Uuid, kind: JobKind },
    JobFailed {
        job_id: Uuid,
        kind: JobKind,
        error: String,
    },
    WorkerStarted,
    WorkerStopped,
}

/// Sends jobs to a running worker. Cheap to clone.
#[derive(Clone)]
pub struct JobDispatcher {
    tx: mpsc::Sender<JobContext>,
}

impl JobDispatcher {
    /// Queue a job for background processing.
    ///
    /// Waits while the queue is full. Fails if the worker is not running.
    pub async fn dispatch(&self, job: &GenerationJob) -> Result<()> {
        self.tx
            .send(JobContext::new(job.id, job.kind))
            .await
            .map_err(|_| Error::Internal(format!("job worker is not running, job {} not queued", job.id)))?;
        debug!(job_id = %job.id, kind = %job.kind, "Job dispatched");
        Ok(())
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    dispatcher: JobDispatcher,
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn dispatcher(&self) -> JobDispatcher {
        self.dispatcher.clone()
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Stop accepting dispatches and wait for in-flight jobs to finish.
    ///
    /// Dispatches still queued in the channel are dropped without being run;
    /// those jobs stay `pending`. Nothing requeues them on the next start, so
    /// they have to be dispatched again by the caller.
    pub async fn shutdown(self) -> Result<()> {
        // A worker that never started (disabled) has already dropped its receiver.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("job worker task failed: {e}")))
    }
}

/// Job worker that processes dispatched jobs.
pub struct JobWorker {
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    pub fn new(config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::WORKER_EVENT_CAPACITY);
        Self {
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for a job kind.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let kind = handler.kind();
        let mut handlers = self.handlers.write().await;
        handlers.insert(kind, Arc::new(handler));
        debug!(%kind, "Registered job handler");
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (job_tx, job_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(job_rx, shutdown_rx).await;
        });

        WorkerHandle {
            dispatcher: JobDispatcher { tx: job_tx },
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip_all, fields(subsystem = "jobs", component = "worker"))]
    async fn run(self, mut job_rx: mpsc::Receiver<JobContext>, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            max_concurrent = self.config.max_concurrent_jobs,
            queue_capacity = self.config.queue_capacity,
            "Job worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Job worker received shutdown signal");
                    break;
                }
                dispatched = job_rx.recv() => {
                    let Some(ctx) = dispatched else {
                        info!("All dispatchers dropped, stopping job worker");
                        break;
                    };
                    let runner = self.runner();
                    let permits = permits.clone();
                    tasks.spawn(async move {
                        let Ok(_permit) = permits.acquire_owned().await else {
                            return;
                        };
                        runner.execute_job(ctx).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = ?e, "Job task panicked");
                    }
                }
            }
        }

        job_rx.close();
        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight jobs");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = ?e, "Job task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    fn runner(&self) -> JobRunner {
        JobRunner {
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

/// Reference bundle for executing a single job in a spawned task.
struct JobRunner {
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobRunner {
    async fn execute_job(self, ctx: JobContext) {
        let start = Instant::now();
        let JobContext { job_id, kind } = ctx;

        info!(%job_id, %kind, "Processing job");
        let _ = self.event_tx.send(WorkerEvent::JobStarted { job_id, kind });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&kind).cloned()
        };

        let result = match handler {
            Some(handler) => handler.execute(ctx).await,
            None => {
                warn!(%kind, "No handler registered for job kind");
                JobResult::Failed(format!("no handler for job kind: {kind}"))
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            JobResult::Success => {
                info!(%job_id, %kind, duration_ms, "Job finished");
                let _ = self
                    .event_tx
                    .send(WorkerEvent::JobCompleted { job_id, kind });
            }
            JobResult::Failed(error) => {
                warn!(%job_id, %kind, %error, duration_ms, "Job failed");
                let _ = self.event_tx.send(WorkerEvent::JobFailed {
                    job_id,
                    kind,
                    error,
                });
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.config);

        for handler in self.handlers {
            let kind = handler.kind();
            let mut handlers = worker.handlers.write().await;
            handlers.insert(kind, Arc::from(handler));
        }

        worker
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
