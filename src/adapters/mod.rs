//! Chain Adapters
//!
//! Trait seams between the transfer lifecycle and the outside world: the
//! signing wallet, the request manager contract on the source chain, the
//! fill manager contract on the target chain and the ERC-20 token. The
//! lifecycle only ever talks to these traits, so a full transfer can run
//! against mocks with no RPC endpoint.
//!
//! Submission methods resolve once the transaction is confirmed, returning
//! its hash; failures before or at confirmation surface as [`ChainError`].

pub mod rpc;

#[cfg(any(test, feature = "mock-chain"))]
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::token::{Address, ChainId, TransactionHash};
use crate::transfer::fulfillment::ScanConfig;
use crate::uint256::UInt256;

/// Errors from chain collaborators
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("Wrong network: expected chain {expected}, connected to {actual}")]
    WrongNetwork { expected: ChainId, actual: ChainId },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Parameters for submitting a transfer request on the source chain
#[derive(Debug, Clone)]
pub struct CreateRequestParams {
    pub target_chain_id: ChainId,
    pub source_token_address: Address,
    pub target_token_address: Address,
    pub target_account: Address,
    pub amount: UInt256,
    /// Seconds the request stays claimable before it can be withdrawn
    pub validity_period: UInt256,
}

/// RequestCreated event decoded from the submission receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCreatedEvent {
    pub request_id: UInt256,
    pub block_number: u64,
}

/// RequestFilled event observed on the target chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilledEvent {
    pub request_id: UInt256,
    pub filler: Address,
    pub transaction_hash: TransactionHash,
    pub block_number: u64,
}

/// The user's signing wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Address of the connected signer
    async fn signer_address(&self) -> Result<Address, ChainError>;

    /// Chain the wallet is currently connected to
    async fn chain_id(&self) -> Result<ChainId, ChainError>;

    /// Ask the wallet to connect to `chain_id`.
    ///
    /// Implementations must verify the switch took effect and return
    /// [`ChainError::WrongNetwork`] when it did not.
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), ChainError>;
}

/// Request manager contract on the source chain
#[async_trait]
pub trait RequestManager: Send + Sync {
    /// Quote the protocol fee for transferring `amount` to `target_chain_id`
    async fn get_request_fee(
        &self,
        target_chain_id: ChainId,
        amount: &UInt256,
    ) -> Result<UInt256, ChainError>;

    /// Submit the transfer request and wait for confirmation
    async fn create_request(
        &self,
        params: &CreateRequestParams,
    ) -> Result<TransactionHash, ChainError>;

    /// Decode the RequestCreated event from a confirmed submission.
    ///
    /// `None` means the receipt exists but carries no matching event.
    async fn read_request_created(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<RequestCreatedEvent>, ChainError>;

    /// Reclaim the funds of an expired, unfilled request
    async fn withdraw_expired_request(
        &self,
        request_id: &UInt256,
    ) -> Result<TransactionHash, ChainError>;
}

/// Fill manager contract on the target chain (read side)
#[async_trait]
pub trait FillManager: Send + Sync {
    async fn latest_block(&self) -> Result<u64, ChainError>;

    /// Look for the RequestFilled event of `request_id` in a bounded block
    /// range (inclusive on both ends).
    async fn query_filled(
        &self,
        request_id: &UInt256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Option<RequestFilledEvent>, ChainError>;
}

/// ERC-20 token contract on the source chain
#[async_trait]
pub trait TokenContract: Send + Sync {
    async fn balance_of(&self, owner: &str) -> Result<UInt256, ChainError>;

    async fn allowance(&self, owner: &str, spender: &str) -> Result<UInt256, ChainError>;

    /// Set the spender allowance and wait for confirmation
    async fn approve(
        &self,
        spender: &str,
        amount: &UInt256,
    ) -> Result<TransactionHash, ChainError>;
}

/// The collaborator handles one transfer lifecycle needs, plus the scan
/// pacing for fulfillment polling.
///
/// Cheap to clone; the lifecycle borrows it per call so independent
/// transfers can share one set of connections.
#[derive(Clone)]
pub struct ChainServices {
    pub wallet: Arc<dyn WalletProvider>,
    pub request_manager: Arc<dyn RequestManager>,
    pub fill_manager: Arc<dyn FillManager>,
    pub token: Arc<dyn TokenContract>,
    pub scan: ScanConfig,
}

impl ChainServices {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        request_manager: Arc<dyn RequestManager>,
        fill_manager: Arc<dyn FillManager>,
        token: Arc<dyn TokenContract>,
    ) -> Self {
        Self {
            wallet,
            request_manager,
            fill_manager,
            token,
            scan: ScanConfig::default(),
        }
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }
}
