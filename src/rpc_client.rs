//! RPC Client Module
//!
//! JSON-RPC client for the Packet network node. Covers the read calls the
//! pipeline fans out before building an envelope (nonce, fee data, batch gas
//! estimation), the `eth_call` pre-flight, and raw-transaction broadcast.
//!
//! The client is an explicitly constructed, injectable object with no module
//! globals, so pipelines and tests choose their own endpoint.

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::envelope::{Address, Call};

/// JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<T>,
    error: Option<JsonRpcErrorBody>,
    #[allow(dead_code)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// Errors from the RPC client, split by origin.
///
/// `Node` carries the node's error message verbatim: for `eth_call` and
/// `eth_sendRawTransaction` that message is typically a decoded contract
/// revert reason, and callers surface or translate it directly.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{message}")]
    Node { message: String, code: i64 },
    #[error("RPC transport error: {0}")]
    Transport(String),
}

/// Fee fields fetched from the network ahead of envelope construction.
#[derive(Debug, Clone, Copy)]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Client for communicating with the network node via JSON-RPC.
pub struct RpcClient {
    /// HTTP client for making requests
    client: Client,
    /// Base URL of the node (e.g., "http://127.0.0.1:8545")
    base_url: String,
}

impl RpcClient {
    /// Creates a new RPC client for the given node URL.
    pub fn new(node_url: &str) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: node_url.to_string(),
        })
    }

    /// Returns the base URL of this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RpcError::Transport(format!(
                    "Failed to send {} request to {}: {}",
                    method, self.base_url, e
                ))
            })?
            .json()
            .await
            .map_err(|e| {
                RpcError::Transport(format!(
                    "Failed to parse {} response from {}: {}",
                    method, self.base_url, e
                ))
            })?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                message: error.message,
                code: error.code,
            });
        }

        response
            .result
            .ok_or_else(|| RpcError::Transport(format!("no result in {} response", method)))
    }

    /// Fetches the sender's current transaction count (the next nonce).
    ///
    /// Queried just-in-time before envelope construction; there is no retry
    /// on a stale nonce.
    pub async fn transaction_count(&self, address: &Address) -> Result<u64, RpcError> {
        let hex: String = self
            .request(
                "eth_getTransactionCount",
                vec![
                    serde_json::json!(address.to_string()),
                    serde_json::json!("pending"),
                ],
            )
            .await?;
        parse_hex_u64(&hex)
    }

    /// Fetches current fee fields: priority fee from the node, max fee
    /// derived as twice the latest base fee plus the priority fee.
    ///
    /// A zero priority fee is floored at 1 gwei so the transaction is not
    /// starved under congestion.
    pub async fn fee_data(&self) -> Result<FeeData, RpcError> {
        let priority_hex: String = self
            .request("eth_maxPriorityFeePerGas", vec![])
            .await?;
        let mut max_priority_fee_per_gas = parse_hex_u128(&priority_hex)?;
        if max_priority_fee_per_gas == 0 {
            max_priority_fee_per_gas = 1_000_000_000;
        }

        #[derive(Debug, Deserialize)]
        struct Block {
            #[serde(rename = "baseFeePerGas")]
            base_fee_per_gas: Option<String>,
        }

        let block: Block = self
            .request(
                "eth_getBlockByNumber",
                vec![serde_json::json!("latest"), serde_json::json!(false)],
            )
            .await?;
        let base_fee = match block.base_fee_per_gas {
            Some(hex) => parse_hex_u128(&hex)?,
            None => 0,
        };

        Ok(FeeData {
            max_fee_per_gas: base_fee.saturating_mul(2) + max_priority_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    /// Estimates gas for an entire batch of calls in one request.
    ///
    /// Uses the batch-aware request shape (`type 0x76`, `calls`, `feePayer`)
    /// rather than per-call estimation: a later call may depend on state
    /// mutated by an earlier call in the same atomic transaction, so only
    /// whole-batch simulation yields a correct bound.
    pub async fn estimate_batch_gas(
        &self,
        from: &Address,
        calls: &[Call],
    ) -> Result<u64, RpcError> {
        let call_objects: Vec<serde_json::Value> = calls
            .iter()
            .map(|call| {
                serde_json::json!({
                    "to": call.to.to_string(),
                    "value": format!("0x{:x}", call.value),
                    "data": format!("0x{}", hex::encode(&call.data)),
                })
            })
            .collect();

        let params = serde_json::json!({
            "from": from.to_string(),
            "type": "0x76",
            "calls": call_objects,
            "feePayer": true,
        });

        let hex: String = self.request("eth_estimateGas", vec![params]).await?;
        parse_hex_u64(&hex)
    }

    /// Simulates a single call via `eth_call`, returning its output bytes.
    ///
    /// A `Node` error carries the revert reason reported by the node.
    pub async fn call(
        &self,
        from: &Address,
        to: &Address,
        data: &[u8],
    ) -> Result<Vec<u8>, RpcError> {
        let params = serde_json::json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });

        let hex: String = self
            .request("eth_call", vec![params, serde_json::json!("latest")])
            .await?;
        hex::decode(hex.strip_prefix("0x").unwrap_or(&hex))
            .map_err(|e| RpcError::Transport(format!("Failed to decode eth_call output: {}", e)))
    }

    /// Broadcasts a serialized transaction, returning its hash.
    ///
    /// A `Node` error carries the node's message verbatim; no retry or
    /// resubmission is attempted here or anywhere above.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        self.request(
            "eth_sendRawTransaction",
            vec![serde_json::json!(format!("0x{}", hex::encode(raw)))],
        )
        .await
    }
}

fn parse_hex_u64(hex: &str) -> Result<u64, RpcError> {
    let stripped = hex.strip_prefix("0x").unwrap_or(hex);
    if stripped.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(stripped, 16)
        .map_err(|e| RpcError::Transport(format!("Failed to parse hex quantity {}: {}", hex, e)))
}

fn parse_hex_u128(hex: &str) -> Result<u128, RpcError> {
    let stripped = hex.strip_prefix("0x").unwrap_or(hex);
    if stripped.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(stripped, 16)
        .map_err(|e| RpcError::Transport(format!("Failed to parse hex quantity {}: {}", hex, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What is tested: hex quantity parsing, including the bare "0x" form
    /// Why: nodes return "0x" for zero-valued quantities
    #[test]
    fn test_parse_hex_quantities() {
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert_eq!(parse_hex_u64("0x1b").unwrap(), 27);
        assert_eq!(parse_hex_u64("0x").unwrap(), 0);
        assert_eq!(parse_hex_u128("0x3b9aca00").unwrap(), 1_000_000_000);
        assert!(parse_hex_u64("0xzz").is_err());
    }
}
