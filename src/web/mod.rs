pub mod error;
pub mod extractors;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use state::AppState;

use crate::{Config, Database};
use anyhow::Result;
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Builds the application router around already wired state.
pub fn router(state: Arc<AppState>) -> Result<Router> {
    let max_upload = state.config.media.max_upload_bytes()?;

    Ok(Router::new()
        .merge(routes::media_routes(max_upload))
        .merge(routes::health_routes())
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config, db)?);
    let app = router(state)?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
