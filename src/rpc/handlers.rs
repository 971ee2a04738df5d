use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stats::{StatsSnapshot, StatsTable};

/// The one method the endpoint answers.
pub const STATUS_METHOD: &str = "Proxy.Status";

#[derive(Clone)]
pub struct RpcState {
    pub stats: Arc<StatsTable>,
}

/// JSON-RPC style call envelope. `params` is accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    pub result: Option<StatsSnapshot>,
    pub error: Option<String>,
}

pub async fn call(State(state): State<RpcState>, Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
    if req.method != STATUS_METHOD {
        tracing::debug!(method = %req.method, "Unknown RPC method");
        return Json(RpcResponse {
            id: req.id,
            result: None,
            error: Some(format!("rpc: can't find method {}", req.method)),
        });
    }

    Json(RpcResponse {
        id: req.id,
        result: Some(state.stats.snapshot()),
        error: None,
    })
}

pub async fn get_stats(State(state): State<RpcState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
