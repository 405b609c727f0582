//! JSON-RPC fill manager client
//!
//! Read-side [`FillManager`] over raw Ethereum JSON-RPC: `eth_blockNumber`
//! for the chain head and `eth_getLogs` against the fill manager contract
//! for RequestFilled events. Write-side collaborators wrap external signer
//! SDKs and have no implementation here.
//!
//! Expected topic layout of the fill event: `[signature, requestId,
//! filler]`, with the request id ABI-encoded as a 32-byte big-endian word.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{ChainError, FillManager, RequestFilledEvent};
use crate::token::{Address, Chain};
use crate::uint256::UInt256;

use async_trait::async_trait;

/// JSON-RPC request structure
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Log entry from eth_getLogs
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct EthLog {
    topics: Vec<String>,
    block_number: String,
    transaction_hash: String,
}

/// JSON-RPC client bound to one fill manager contract
pub struct EthRpcClient {
    url: String,
    fill_manager_address: Address,
    filled_event_topic: String,
    client: reqwest::Client,
}

impl EthRpcClient {
    pub fn new(
        rpc_url: &str,
        fill_manager_address: &str,
        filled_event_topic: &str,
    ) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ChainError::Rpc(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: rpc_url.to_string(),
            fill_manager_address: fill_manager_address.to_string(),
            filled_event_topic: filled_event_topic.to_string(),
            client,
        })
    }

    /// Build a client from chain metadata
    pub fn for_chain(chain: &Chain, filled_event_topic: &str) -> Result<Self, ChainError> {
        Self::new(
            &chain.rpc_url,
            &chain.fill_manager_address,
            filled_event_topic,
        )
    }

    /// Make a JSON-RPC call
    async fn rpc_call<T, R>(&self, method: &'static str, params: T) -> Result<R, ChainError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("HTTP request failed: {}", e)))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(ChainError::Rpc(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| ChainError::Rpc("No result in RPC response".to_string()))
    }
}

#[async_trait]
impl FillManager for EthRpcClient {
    async fn latest_block(&self) -> Result<u64, ChainError> {
        let result: String = self.rpc_call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&result)
    }

    async fn query_filled(
        &self,
        request_id: &UInt256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Option<RequestFilledEvent>, ChainError> {
        let filter = json!({
            "address": self.fill_manager_address,
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "topics": [self.filled_event_topic, request_id_topic(request_id)],
        });

        let logs: Vec<EthLog> = self.rpc_call("eth_getLogs", (filter,)).await?;
        debug!(
            from_block,
            to_block,
            matches = logs.len(),
            "queried fill manager logs"
        );

        let Some(log) = logs.into_iter().next() else {
            return Ok(None);
        };

        let filler = log
            .topics
            .get(2)
            .map(|topic| topic_to_address(topic))
            .ok_or_else(|| ChainError::Rpc("fill log missing filler topic".to_string()))?;

        Ok(Some(RequestFilledEvent {
            request_id: request_id.clone(),
            filler,
            transaction_hash: log.transaction_hash,
            block_number: parse_hex_u64(&log.block_number)?,
        }))
    }
}

/// ABI-encode a request id as a 32-byte indexed-topic word
fn request_id_topic(request_id: &UInt256) -> String {
    let bytes = request_id.to_bytes_be();
    let mut word = [0u8; 32];
    // Values always fit one EVM word; drop high bytes if someone passes more
    let tail = &bytes[bytes.len().saturating_sub(32)..];
    word[32 - tail.len()..].copy_from_slice(tail);
    format!("0x{}", hex::encode(word))
}

/// Extract the address from a 32-byte indexed-topic word
fn topic_to_address(topic: &str) -> Address {
    let digits = topic.trim_start_matches("0x");
    if digits.len() >= 40 {
        format!("0x{}", &digits[digits.len() - 40..])
    } else {
        topic.to_string()
    }
}

fn parse_hex_u64(value: &str) -> Result<u64, ChainError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Rpc(format!("Invalid hex quantity {}: {}", value, e)))
}
