//! Client for the stats RPC endpoint.

use reqwest::Client;
use serde_json::json;

use crate::rpc::handlers::{RpcResponse, STATUS_METHOD};
use crate::stats::StatsSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("response carried neither result nor error")]
    EmptyResponse,
}

pub struct StatsClient {
    client: Client,
    base_url: String,
}

impl StatsClient {
    /// `base_url` is the RPC listener root, e.g. `http://127.0.0.1:8079`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Call `Proxy.Status` and return the stats snapshot.
    pub async fn status(&self) -> Result<StatsSnapshot, RpcClientError> {
        let resp = self
            .client
            .post(format!("{}/rpc", self.base_url))
            .json(&json!({ "id": 1, "method": STATUS_METHOD, "params": [] }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RpcClientError::Status(status));
        }

        let body: RpcResponse = resp.json().await?;
        match (body.result, body.error) {
            (_, Some(error)) => Err(RpcClientError::Remote(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcClientError::EmptyResponse),
        }
    }
}
