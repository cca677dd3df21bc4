use axum::{Json, Router, extract::State, routing::post};
use moat_dns::RecordType;
use moat_resolver::{ResolveError, Response};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::global::SharedGlobal;

pub fn create_query_router() -> Router<SharedGlobal> {
    Router::new().route("/", post(query))
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryPayload {
    query: String,
    #[serde(rename = "type")]
    qtype: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    reason: String,
    response_type: String,
    /// Answers as `TYPE (data)`, comma separated
    response: String,
    return_code: String,
}

impl From<Response> for QueryResponse {
    fn from(response: Response) -> Self {
        let answers: Vec<String> = response.message.answers().iter().map(ToString::to_string).collect();

        let return_code = match response.message.response_code() {
            Ok(rcode) => rcode.to_string(),
            Err(_) => "UNKNOWN".to_string(),
        };

        Self {
            reason: response.reason,
            response_type: response.resolver_type.to_string(),
            response: answers.join(", "),
            return_code,
        }
    }
}

pub async fn query(global: State<SharedGlobal>, Json(payload): Json<QueryPayload>) -> Result<Json<QueryResponse>, ApiError> {
    let Ok(qtype) = payload.qtype.parse::<RecordType>() else {
        return Err(ApiError::bad_request(format!("unknown query type '{}'", payload.qtype)));
    };

    match global.querier.query(&payload.query, qtype).await {
        Ok(response) => Ok(Json(response.into())),
        Err(ResolveError::InvalidRequest(e)) => Err(ApiError::bad_request(e)),
        Err(e) => {
            tracing::error!(query = %payload.query, qtype = %qtype, "query failed: {e}");
            Err(ApiError::server_error_with(e.to_string()))
        }
    }
}
