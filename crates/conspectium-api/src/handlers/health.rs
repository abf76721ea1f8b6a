use axum::response::IntoResponse;
use axum::Json;

/// `GET /api/health`
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
