//! HTTP JSON-RPC node client backed by `reqwest`.
//!
//! Speaks the three calls the engine needs: `eth_blockNumber`,
//! `eth_getLogs` and `eth_getBlockByNumber`. Retries and timeouts live in
//! the [`LogFetcher`](crate::fetcher::LogFetcher); this client makes one
//! attempt per call and classifies the failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use eventsync_core::error::NodeError;
use eventsync_core::node::NodeClient;
use eventsync_core::types::{LogFilter, RawLog};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// A log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl TryFrom<RpcLog> for RawLog {
    type Error = NodeError;

    fn try_from(log: RpcLog) -> Result<Self, Self::Error> {
        // Pending logs carry no block; the engine only asks for mined ranges.
        let missing = |field: &str| NodeError::InvalidResponse(format!("log without {field}"));
        let block_number = parse_quantity(log.block_number.as_deref().ok_or_else(|| missing("blockNumber"))?)?;
        let log_index = parse_quantity(log.log_index.as_deref().ok_or_else(|| missing("logIndex"))?)?;
        let log_index = u32::try_from(log_index)
            .map_err(|_| NodeError::InvalidResponse(format!("log index {log_index} out of range")))?;

        Ok(RawLog {
            address: log.address.to_ascii_lowercase(),
            topics: log.topics.into_iter().map(|t| t.to_ascii_lowercase()).collect(),
            data: parse_data(&log.data)?,
            block_number,
            block_hash: log.block_hash.ok_or_else(|| missing("blockHash"))?.to_ascii_lowercase(),
            tx_hash: log.transaction_hash.ok_or_else(|| missing("transactionHash"))?.to_ascii_lowercase(),
            log_index,
            removed: log.removed,
        })
    }
}

/// Parse a hex quantity (`0x1a`) into a `u64`.
pub fn parse_quantity(s: &str) -> Result<u64, NodeError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| NodeError::InvalidResponse(format!("quantity without 0x prefix: {s:?}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| NodeError::InvalidResponse(format!("bad quantity {s:?}: {e}")))
}

/// Parse hex data (`0x…`) into bytes.
pub fn parse_data(s: &str) -> Result<Vec<u8>, NodeError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| NodeError::InvalidResponse(format!("bad hex data: {e}")))
}

fn quantity(n: u64) -> String {
    format!("0x{n:x}")
}

/// `eth_getLogs` filter object for `[from, to]`.
pub fn logs_params(from: u64, to: u64, filter: &LogFilter) -> Value {
    let mut obj = json!({
        "fromBlock": quantity(from),
        "toBlock": quantity(to),
    });
    if !filter.addresses.is_empty() {
        obj["address"] = json!(filter.addresses);
    }
    if !filter.topic0s.is_empty() {
        obj["topics"] = json!([filter.topic0s]);
    }
    json!([obj])
}

// ─── HttpNodeClient ──────────────────────────────────────────────────────────

/// JSON-RPC node client over HTTP.
pub struct HttpNodeClient {
    url: String,
    http: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpNodeClient {
    /// Create a client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, NodeError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            timeout: request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let resp = self.http.post(&self.url).json(&req).send().await.map_err(|e| {
            if e.is_timeout() {
                NodeError::Timeout { ms: self.timeout.as_millis() as u64 }
            } else {
                NodeError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(NodeError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NodeError::Transport(format!("HTTP {}: {body}", status.as_u16())));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| NodeError::InvalidResponse(e.to_string()))?;
        if let Some(err) = body.error {
            tracing::debug!(method, code = err.code, message = %err.message, "RPC error");
            return Err(NodeError::Rpc { code: err.code, message: err.message });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn block_head(&self) -> Result<u64, NodeError> {
        let v = self.call("eth_blockNumber", json!([])).await?;
        let s = v
            .as_str()
            .ok_or_else(|| NodeError::InvalidResponse(format!("eth_blockNumber returned {v}")))?;
        parse_quantity(s)
    }

    async fn get_logs(&self, from: u64, to: u64, filter: &LogFilter) -> Result<Vec<RawLog>, NodeError> {
        let v = self.call("eth_getLogs", logs_params(from, to, filter)).await?;
        let logs: Vec<RpcLog> =
            serde_json::from_value(v).map_err(|e| NodeError::InvalidResponse(format!("eth_getLogs: {e}")))?;
        logs.into_iter().map(RawLog::try_from).collect()
    }

    async fn block_hash(&self, number: u64) -> Result<Option<String>, NodeError> {
        let v = self
            .call("eth_getBlockByNumber", json!([quantity(number), false]))
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        v["hash"]
            .as_str()
            .map(|h| Some(h.to_ascii_lowercase()))
            .ok_or_else(|| NodeError::InvalidResponse(format!("block #{number} without hash")))
    }
}
