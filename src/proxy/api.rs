//! JSON API handlers over the retrieval core.

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::proxy::request_id::request_id_of;
use crate::proxy::server::AppState;
use crate::retrieval::{RetrievalError, RetrievalTier, TransactionPage};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: String) -> Response {
    (status, Json(ErrorBody { error, message })).into_response()
}

impl IntoResponse for RetrievalError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            RetrievalError::InvalidHash(_) => error_response(StatusCode::BAD_REQUEST, "invalid_hash", message),
            RetrievalError::NotFound { .. } => error_response(StatusCode::NOT_FOUND, "not_found", message),
            RetrievalError::Unreachable { .. } => error_response(StatusCode::BAD_GATEWAY, "unreachable", message),
            RetrievalError::Setup(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "setup", message),
        }
    }
}

/// `GET /api/transactions/{hash}`
pub async fn transaction(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    match state.orchestrator.transaction(&hash).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `GET /api/accounts/{address}/transactions?page=&limit=`
pub async fn address_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<TransactionPage> {
    Json(
        state
            .orchestrator
            .address_history(&address, query.page, query.limit)
            .await,
    )
}

/// `GET /rpc/{*path}`
pub async fn node_rpc(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id_of(&headers);
    match state.node.forward(&path, query.as_deref(), &request_id).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, error = ?e, "Node RPC forward failed");
            e.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    tiers: Vec<RetrievalTier>,
    preferred: RetrievalTier,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let tiers = state.orchestrator.configured_tiers();
    let body = HealthBody {
        status: if tiers.is_empty() { "degraded" } else { "ok" },
        preferred: state.orchestrator.preference().current(),
        tiers,
    };
    Json(body).into_response()
}
