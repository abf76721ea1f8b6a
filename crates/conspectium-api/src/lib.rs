//! # conspectium-api
//!
//! HTTP surface of the Conspectium generation pipeline. Handlers validate the
//! caller, create jobs through [`GenerationService`], hand them to the job
//! worker and answer `202 Accepted`; clients poll `GET /api/jobs/:id`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use conspectium_jobs::{GenerationService, JobDispatcher};

pub use auth::CurrentUser;
pub use config::ServerConfig;
pub use error::ApiError;

/// Slack on top of the audio limit for multipart framing and other fields.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub dispatcher: JobDispatcher,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        service: Arc<GenerationService>,
        dispatcher: JobDispatcher,
        config: ServerConfig,
    ) -> Self {
        Self {
            service,
            dispatcher,
            config: Arc::new(config),
        }
    }
}

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size + BODY_LIMIT_SLACK;

    let api = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/audio/upload", post(handlers::audio::upload_audio))
        .route("/conspects", post(handlers::conspects::create_conspect))
        .route("/conspects/:id", get(handlers::conspects::get_conspect))
        .route(
            "/conspects/:id/variants",
            post(handlers::conspects::add_variant),
        )
        .route("/quizzes", post(handlers::quizzes::create_quiz))
        .route("/quizzes/:id", get(handlers::quizzes::get_quiz))
        .route(
            "/quizzes/:id/results",
            post(handlers::quizzes::submit_quiz),
        )
        .route("/jobs/:id", get(handlers::jobs::get_job));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
