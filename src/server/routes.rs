use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use super::handlers;
use super::AppState;

/// アップロード上限（写真をまとめて送るため大きめ）
const MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload_and_process", post(handlers::upload_and_process))
        .route("/api/status", get(handlers::status))
        .route("/api/reset", get(handlers::reset).post(handlers::reset))
        .route("/api/download_results", get(handlers::download_results))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
