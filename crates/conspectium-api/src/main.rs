//! conspectium-api - HTTP API server for Conspectium

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conspectium_api::{router, AppState, ServerConfig};
use conspectium_core::PipelineConfig;
use conspectium_db::{Database, FilesystemBackend};
use conspectium_inference::{AiBackend, OpenAIBackend, OpenAIConfig};
use conspectium_jobs::{
    GenerationService, NoteJobHandler, QuizJobHandler, WorkerBuilder, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "conspectium_api=debug,conspectium_jobs=debug,conspectium_inference=info,tower_http=debug"
            .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("conspectium-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files by default
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let server_config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    info!(
        environment = %pipeline_config.environment,
        transcription_placeholder = pipeline_config.transcription_placeholder,
        "Pipeline configured"
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&server_config.database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let storage = Arc::new(FilesystemBackend::new(&server_config.audio_storage_dir));
    info!("Audio storage initialized at {}", server_config.audio_storage_dir);

    let ai: Arc<dyn AiBackend> = Arc::new(OpenAIBackend::from_env()?);
    let mut service = GenerationService::new(
        Arc::new(db.generation.clone()),
        storage,
        ai,
        pipeline_config,
    );
    if let Some(text_config) = OpenAIConfig::text_from_env() {
        info!("Using a separate AI client for text-only note jobs");
        service = service.with_text_ai(Arc::new(OpenAIBackend::new(text_config)?));
    }
    let service = Arc::new(service);

    // Create and start job worker
    let worker_config = WorkerConfig::from_env();
    if !worker_config.enabled {
        warn!("Job worker disabled; created jobs will stay pending");
    }
    let worker = WorkerBuilder::new()
        .with_config(worker_config)
        .with_handler(NoteJobHandler::new(service.clone()))
        .with_handler(QuizJobHandler::new(service.clone()))
        .build()
        .await;
    let worker_handle = worker.start();

    let state = AppState::new(service, worker_handle.dispatcher(), server_config.clone());
    let app = router(state);

    // Start server
    let addr: SocketAddr = server_config.bind_address().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, draining job worker...");
    worker_handle.shutdown().await?;
    info!("Job worker stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
