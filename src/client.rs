use crate::models::NodeStatus;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Seam between the health checks and the node RPC endpoints. The HTTP
/// implementation lives below; tests substitute scripted responses.
#[async_trait]
pub trait StatusFetch {
    async fn fetch_status(&self, url: &str) -> Result<NodeStatus, FetchError>;
    async fn fetch_peer_count(&self, url: &str) -> Result<usize, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpStatusClient {
    client: Client,
    timeout: Duration,
}

impl HttpStatusClient {
    /// One timeout shared by every request issued during a run.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, FetchError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::InvalidResponse(format!("status code {status}")));
        }

        response.json::<T>().await.map_err(classify)
    }
}

#[async_trait]
impl StatusFetch for HttpStatusClient {
    async fn fetch_status(&self, url: &str) -> Result<NodeStatus, FetchError> {
        let response = self.get_json::<StatusResponse>(url).await?;
        into_node_status(response)
    }

    async fn fetch_peer_count(&self, url: &str) -> Result<usize, FetchError> {
        let response = self.get_json::<NetInfoResponse>(&net_info_url(url)).await?;
        Ok(response.result.peers.len())
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() || error.is_request() {
        FetchError::Connection(error.to_string())
    } else {
        FetchError::InvalidResponse(error.to_string())
    }
}

/// The network-info endpoint lives on the same host as the status
/// endpoint, with the `status` path segment swapped for `net_info`.
fn net_info_url(status_url: &str) -> String {
    status_url.replace("status", "net_info")
}

fn into_node_status(response: StatusResponse) -> Result<NodeStatus, FetchError> {
    let sync_info = response.result.sync_info;
    let latest_block_height = sync_info
        .latest_block_height
        .parse::<u64>()
        .map_err(|error| FetchError::InvalidResponse(format!("invalid block height: {error}")))?;

    // Tendermint serializes voting power as a decimal string.
    let voting_power = response
        .result
        .validator_info
        .map(|info| info.voting_power.parse::<i64>())
        .transpose()
        .map_err(|error| FetchError::InvalidResponse(format!("invalid voting power: {error}")))?;

    Ok(NodeStatus {
        latest_block_height,
        catching_up: sync_info.catching_up,
        voting_power,
    })
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    result: StatusResult,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
    validator_info: Option<ValidatorInfo>,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
    catching_up: bool,
}

#[derive(Debug, Deserialize)]
struct ValidatorInfo {
    voting_power: String,
}

#[derive(Debug, Deserialize)]
struct NetInfoResponse {
    result: NetInfoResult,
}

#[derive(Debug, Deserialize)]
struct NetInfoResult {
    peers: Vec<serde_json::Value>,
}
