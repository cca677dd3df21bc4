use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::global::SharedGlobal;

pub fn create_blocking_router() -> Router<SharedGlobal> {
    Router::new()
        .route("/enable", get(enable))
        .route("/disable", get(disable))
        .route("/status", get(status))
}

pub async fn enable(global: State<SharedGlobal>) -> StatusCode {
    global.control.enable_blocking();
    StatusCode::OK
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DisableQuery {
    /// e.g. `30s`, `5m`; absent or `0` disables until enabled again
    duration: Option<String>,
    /// Comma separated group names, absent means all groups
    groups: Option<String>,
}

impl DisableQuery {
    fn groups(&self) -> Vec<String> {
        self.groups
            .as_deref()
            .map(|groups| {
                groups
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub async fn disable(global: State<SharedGlobal>, query: Query<DisableQuery>) -> Result<StatusCode, ApiError> {
    if let Err(e) = global.control.disable_blocking(query.duration.as_deref(), query.groups()) {
        tracing::debug!("rejected disable request: {e}");
        return Err(ApiError::bad_request(e.to_string()));
    }

    Ok(StatusCode::OK)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disabled_groups: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    auto_enable_in_sec: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

pub async fn status(global: State<SharedGlobal>) -> Json<StatusResponse> {
    let status = global.control.blocking_status();

    Json(StatusResponse {
        enabled: status.enabled,
        disabled_groups: status.disabled_groups,
        auto_enable_in_sec: status.auto_enable_in_sec,
    })
}
