use axum::Router;
use blocking::create_blocking_router;
use lists::create_lists_router;
use query::create_query_router;

mod blocking;
mod error;
mod lists;
mod query;

use crate::global::SharedGlobal;

/// The control API router, mounted under `/api`.
pub fn create_router(global: SharedGlobal) -> Router {
    let api = Router::new()
        .nest("/blocking", create_blocking_router())
        .nest("/lists", create_lists_router())
        .nest("/query", create_query_router());

    Router::new().nest("/api", api).with_state(global)
}

pub async fn serve_web(global: SharedGlobal) -> anyhow::Result<()> {
    let addr = global.config.http.addr()?;
    let app = create_router(global);

    tracing::info!("HTTP listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
