//! Fulfillment scan
//!
//! Polls the target chain's fill manager for the RequestFilled event of one
//! request. Queries run over bounded block ranges so no single log query
//! can blow up on a public RPC endpoint: the cursor advances chunk by
//! chunk, transient query errors shrink the chunk and retry, and at the
//! chain head the scan waits for new blocks.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::adapters::{FillManager, RequestFilledEvent};
use crate::transfer::error::TransferError;
use crate::uint256::UInt256;

/// Scan pacing and bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Blocks per log query
    pub chunk_size: u64,
    /// Floor the error backoff never shrinks below
    pub min_chunk_size: u64,
    /// Delay between consecutive queries
    pub poll_interval_ms: u64,
    /// Give up after this many seconds; `None` scans until cancelled
    pub max_wait_secs: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            min_chunk_size: 2,
            poll_interval_ms: 500,
            max_wait_secs: Some(600),
        }
    }
}

/// Scan for the RequestFilled event of `request_id`, starting at
/// `from_block`.
///
/// Returns the event once observed. Query failures never fail the scan;
/// the chunk size halves (down to the configured floor) and the same range
/// is retried, growing back on success. When `max_wait_secs` is set and
/// exceeded the scan fails with [`TransferError::FulfillmentTimeout`];
/// dropping the future cancels the scan at any await point.
pub async fn wait_for_request_fill(
    fill_manager: &dyn FillManager,
    request_id: &UInt256,
    from_block: u64,
    config: &ScanConfig,
) -> Result<RequestFilledEvent, TransferError> {
    let deadline = config
        .max_wait_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let poll = Duration::from_millis(config.poll_interval_ms);
    let min_chunk = config.min_chunk_size.max(1);
    let max_chunk = config.chunk_size.max(min_chunk);

    let mut chunk = max_chunk;
    let mut cursor = from_block;

    loop {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(TransferError::FulfillmentTimeout(
                config.max_wait_secs.unwrap_or(0),
            ));
        }

        let latest = match fill_manager.latest_block().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Failed to read chain head: {}", e);
                sleep(poll).await;
                continue;
            }
        };

        if cursor > latest {
            debug!(
                "Request {}: scanned to chain head ({}), waiting for new blocks",
                request_id, latest
            );
            sleep(poll).await;
            continue;
        }

        let to_block = latest.min(cursor.saturating_add(chunk - 1));
        match fill_manager.query_filled(request_id, cursor, to_block).await {
            Ok(Some(event)) => {
                info!(
                    "Request {} filled at block {} by {} (tx: {})",
                    request_id, event.block_number, event.filler, event.transaction_hash
                );
                return Ok(event);
            }
            Ok(None) => {
                cursor = to_block + 1;
                chunk = (chunk * 2).min(max_chunk);
            }
            Err(e) => {
                chunk = (chunk / 2).max(min_chunk);
                warn!(
                    "Request {}: log query {}..={} failed ({}), retrying with chunk {}",
                    request_id, cursor, to_block, e, chunk
                );
            }
        }

        sleep(poll).await;
    }
}
