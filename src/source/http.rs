use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use eyre::Result;
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{BlockSource, SourceError};

/// Reads blocks from an archiver node over JSON-RPC.
///
/// `getBlockNumber` returns the latest height, `getBlocks(from, limit)` returns
/// up to `limit` encoded blocks starting at `from` as hex strings.
#[derive(Debug)]
pub struct HttpBlockSource {
    url: Url,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl HttpBlockSource {
    /// Creates a new source. Errors if the url cannot be parsed or the client
    /// cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url,
            client,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.map_transport_error(e))?;

        let resp: RpcResponse = resp.json().await.map_err(|e| self.map_transport_error(e))?;

        if let Some(err) = resp.error {
            return Err(SourceError::Unavailable(format!(
                "{} failed with code {}: {}",
                method, err.code, err.message
            )));
        }

        let result = resp
            .result
            .ok_or_else(|| SourceError::Unavailable(format!("{} returned no result", method)))?;

        serde_json::from_value(result)
            .map_err(|e| SourceError::Unavailable(format!("{} returned malformed result: {}", method, e)))
    }

    fn map_transport_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl BlockSource for HttpBlockSource {
    async fn latest_height(&self) -> Result<u64, SourceError> {
        let height: Value = self.call("getBlockNumber", json!([])).await?;
        parse_height(&height)
    }

    async fn get_blocks(&self, from: u64, to: u64) -> Result<Vec<Bytes>, SourceError> {
        if to < from {
            return Ok(Vec::new());
        }

        let limit = to - from + 1;
        let blocks: Vec<String> = self.call("getBlocks", json!([from, limit])).await?;

        blocks
            .iter()
            .map(|b| decode_hex(b))
            .collect::<Result<Vec<_>, _>>()
    }
}

/// Heights arrive either as JSON numbers or as hex quantities
fn parse_height(value: &Value) -> Result<u64, SourceError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| SourceError::Unavailable(format!("invalid block number {}", n))),
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            u64::from_str_radix(digits, 16)
                .map_err(|_| SourceError::Unavailable(format!("invalid block number {}", s)))
        }
        other => Err(SourceError::Unavailable(format!(
            "invalid block number {}",
            other
        ))),
    }
}

fn decode_hex(data: &str) -> Result<Bytes, SourceError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| SourceError::Malformed(format!("invalid block hex: {}", e)))
}
