use axum::{Router, extract::State, http::StatusCode, routing::post};

use super::error::ApiError;
use crate::global::SharedGlobal;

pub fn create_lists_router() -> Router<SharedGlobal> {
    Router::new().route("/refresh", post(refresh))
}

pub async fn refresh(global: State<SharedGlobal>) -> Result<StatusCode, ApiError> {
    if let Err(e) = global.refresher.refresh_lists().await {
        tracing::error!("failed to refresh lists: {e:#}");
        return Err(ApiError::server_error_with(format!("{e:#}")));
    }

    Ok(StatusCode::OK)
}
