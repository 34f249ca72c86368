use crate::web::handlers;
use crate::web::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// Room for the multipart framing and text fields around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn media_routes(max_upload: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/media",
            get(handlers::media::get_index).post(handlers::media::post_index),
        )
        .route(
            "/media/:media_id",
            get(handlers::media::get_single).put(handlers::media::put_index),
        )
        .route("/media/:media_id/data", get(handlers::media::get_data))
        .layer(DefaultBodyLimit::max(
            max_upload.saturating_add(MULTIPART_OVERHEAD),
        ))
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(handlers::health::health))
}
