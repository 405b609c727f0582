//! Mock chain collaborators
//!
//! In-memory implementations of the adapter traits with call counters and
//! configurable failure switches, enough to drive full transfer lifecycles
//! without an RPC endpoint. Compiled for tests and behind the `mock-chain`
//! feature so downstream harnesses can use them too.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    ChainError, ChainServices, CreateRequestParams, FillManager, RequestCreatedEvent,
    RequestFilledEvent, RequestManager, TokenContract, WalletProvider,
};
use crate::token::{Address, ChainId, TransactionHash};
use crate::uint256::UInt256;

// ============================================================================
// Wallet
// ============================================================================

pub struct MockWallet {
    address: Address,
    current_chain: Mutex<ChainId>,
    switch_history: Mutex<Vec<ChainId>>,
    fail_switch: Mutex<bool>,
}

impl MockWallet {
    pub fn new(address: &str, chain_id: ChainId) -> Self {
        Self {
            address: address.to_string(),
            current_chain: Mutex::new(chain_id),
            switch_history: Mutex::new(Vec::new()),
            fail_switch: Mutex::new(false),
        }
    }

    pub fn set_fail_switch(&self, fail: bool) {
        *self.fail_switch.lock().unwrap() = fail;
    }

    /// Chains the wallet was asked to switch to, in order
    pub fn switch_history(&self) -> Vec<ChainId> {
        self.switch_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn signer_address(&self) -> Result<Address, ChainError> {
        Ok(self.address.clone())
    }

    async fn chain_id(&self) -> Result<ChainId, ChainError> {
        Ok(*self.current_chain.lock().unwrap())
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), ChainError> {
        self.switch_history.lock().unwrap().push(chain_id);

        if *self.fail_switch.lock().unwrap() {
            let actual = *self.current_chain.lock().unwrap();
            return Err(ChainError::WrongNetwork {
                expected: chain_id,
                actual,
            });
        }

        *self.current_chain.lock().unwrap() = chain_id;
        Ok(())
    }
}

// ============================================================================
// Request manager
// ============================================================================

pub struct MockRequestManager {
    fee: Mutex<UInt256>,
    next_request_id: Mutex<UInt256>,
    creation_block: Mutex<u64>,
    created_events: Mutex<HashMap<TransactionHash, RequestCreatedEvent>>,
    omit_created_event: Mutex<bool>,
    fail_create: Mutex<bool>,
    fail_withdraw: Mutex<bool>,
    fee_quote_count: AtomicUsize,
    create_count: AtomicUsize,
    withdraw_count: AtomicUsize,
}

impl MockRequestManager {
    pub fn new() -> Self {
        Self {
            fee: Mutex::new(UInt256::zero()),
            next_request_id: Mutex::new(UInt256::from(1u64)),
            creation_block: Mutex::new(100),
            created_events: Mutex::new(HashMap::new()),
            omit_created_event: Mutex::new(false),
            fail_create: Mutex::new(false),
            fail_withdraw: Mutex::new(false),
            fee_quote_count: AtomicUsize::new(0),
            create_count: AtomicUsize::new(0),
            withdraw_count: AtomicUsize::new(0),
        }
    }

    pub fn set_fee(&self, fee: UInt256) {
        *self.fee.lock().unwrap() = fee;
    }

    /// Request id the next successful submission reports
    pub fn set_next_request_id(&self, id: UInt256) {
        *self.next_request_id.lock().unwrap() = id;
    }

    /// Block number stamped on the next RequestCreated event
    pub fn set_creation_block(&self, block: u64) {
        *self.creation_block.lock().unwrap() = block;
    }

    /// Confirm submissions without recording a RequestCreated event
    pub fn set_omit_created_event(&self, omit: bool) {
        *self.omit_created_event.lock().unwrap() = omit;
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn set_fail_withdraw(&self, fail: bool) {
        *self.fail_withdraw.lock().unwrap() = fail;
    }

    pub fn fee_quote_count(&self) -> usize {
        self.fee_quote_count.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(Ordering::SeqCst)
    }

    pub fn withdraw_count(&self) -> usize {
        self.withdraw_count.load(Ordering::SeqCst)
    }
}

impl Default for MockRequestManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestManager for MockRequestManager {
    async fn get_request_fee(
        &self,
        _target_chain_id: ChainId,
        _amount: &UInt256,
    ) -> Result<UInt256, ChainError> {
        self.fee_quote_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.fee.lock().unwrap().clone())
    }

    async fn create_request(
        &self,
        _params: &CreateRequestParams,
    ) -> Result<TransactionHash, ChainError> {
        let n = self.create_count.fetch_add(1, Ordering::SeqCst) + 1;

        if *self.fail_create.lock().unwrap() {
            return Err(ChainError::TransactionReverted(
                "mock create_request revert".to_string(),
            ));
        }

        let hash = format!("0xcreate{}", n);
        if !*self.omit_created_event.lock().unwrap() {
            let event = RequestCreatedEvent {
                request_id: self.next_request_id.lock().unwrap().clone(),
                block_number: *self.creation_block.lock().unwrap(),
            };
            self.created_events
                .lock()
                .unwrap()
                .insert(hash.clone(), event);
        }
        Ok(hash)
    }

    async fn read_request_created(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<RequestCreatedEvent>, ChainError> {
        Ok(self
            .created_events
            .lock()
            .unwrap()
            .get(transaction_hash)
            .cloned())
    }

    async fn withdraw_expired_request(
        &self,
        _request_id: &UInt256,
    ) -> Result<TransactionHash, ChainError> {
        let n = self.withdraw_count.fetch_add(1, Ordering::SeqCst) + 1;

        if *self.fail_withdraw.lock().unwrap() {
            return Err(ChainError::TransactionReverted(
                "mock withdraw revert".to_string(),
            ));
        }

        Ok(format!("0xwithdraw{}", n))
    }
}

// ============================================================================
// Fill manager
// ============================================================================

pub struct MockFillManager {
    latest_block: Mutex<u64>,
    fill: Mutex<Option<RequestFilledEvent>>,
    fail_next_queries: Mutex<usize>,
    query_count: AtomicUsize,
    queried_ranges: Mutex<Vec<(u64, u64)>>,
}

impl MockFillManager {
    pub fn new(latest_block: u64) -> Self {
        Self {
            latest_block: Mutex::new(latest_block),
            fill: Mutex::new(None),
            fail_next_queries: Mutex::new(0),
            query_count: AtomicUsize::new(0),
            queried_ranges: Mutex::new(Vec::new()),
        }
    }

    pub fn set_latest_block(&self, block: u64) {
        *self.latest_block.lock().unwrap() = block;
    }

    /// Script the fill event the scan should eventually find
    pub fn script_fill(&self, event: RequestFilledEvent) {
        *self.fill.lock().unwrap() = Some(event);
    }

    /// Make the next `n` queries fail with an RPC error
    pub fn set_fail_next_queries(&self, n: usize) {
        *self.fail_next_queries.lock().unwrap() = n;
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Block ranges queried so far, in order
    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.queried_ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl FillManager for MockFillManager {
    async fn latest_block(&self) -> Result<u64, ChainError> {
        Ok(*self.latest_block.lock().unwrap())
    }

    async fn query_filled(
        &self,
        request_id: &UInt256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Option<RequestFilledEvent>, ChainError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.queried_ranges
            .lock()
            .unwrap()
            .push((from_block, to_block));

        {
            let mut remaining = self.fail_next_queries.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::Rpc("mock log query failure".to_string()));
            }
        }

        let fill = self.fill.lock().unwrap();
        if let Some(event) = fill.as_ref()
            && event.request_id == *request_id
            && event.block_number >= from_block
            && event.block_number <= to_block
        {
            return Ok(Some(event.clone()));
        }
        Ok(None)
    }
}

// ============================================================================
// Token contract
// ============================================================================

pub struct MockTokenContract {
    balances: Mutex<HashMap<Address, UInt256>>,
    // Keyed by spender; the mock assumes a single signer
    allowances: Mutex<HashMap<Address, UInt256>>,
    fail_approve: Mutex<bool>,
    approve_count: AtomicUsize,
}

impl MockTokenContract {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            fail_approve: Mutex::new(false),
            approve_count: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, owner: &str, amount: UInt256) {
        self.balances
            .lock()
            .unwrap()
            .insert(owner.to_string(), amount);
    }

    pub fn set_allowance(&self, spender: &str, amount: UInt256) {
        self.allowances
            .lock()
            .unwrap()
            .insert(spender.to_string(), amount);
    }

    pub fn set_fail_approve(&self, fail: bool) {
        *self.fail_approve.lock().unwrap() = fail;
    }

    pub fn approve_count(&self) -> usize {
        self.approve_count.load(Ordering::SeqCst)
    }
}

impl Default for MockTokenContract {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenContract for MockTokenContract {
    async fn balance_of(&self, owner: &str) -> Result<UInt256, ChainError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(owner)
            .cloned()
            .unwrap_or_else(UInt256::zero))
    }

    async fn allowance(&self, _owner: &str, spender: &str) -> Result<UInt256, ChainError> {
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(spender)
            .cloned()
            .unwrap_or_else(UInt256::zero))
    }

    async fn approve(&self, spender: &str, amount: &UInt256) -> Result<TransactionHash, ChainError> {
        let n = self.approve_count.fetch_add(1, Ordering::SeqCst) + 1;

        if *self.fail_approve.lock().unwrap() {
            return Err(ChainError::TransactionReverted(
                "mock approve revert".to_string(),
            ));
        }

        self.allowances
            .lock()
            .unwrap()
            .insert(spender.to_string(), amount.clone());
        Ok(format!("0xapprove{}", n))
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// One mock of everything, pre-wired for lifecycle tests.
pub struct MockChain {
    pub wallet: Arc<MockWallet>,
    pub request_manager: Arc<MockRequestManager>,
    pub fill_manager: Arc<MockFillManager>,
    pub token: Arc<MockTokenContract>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            wallet: Arc::new(MockWallet::new(
                "0x00d5206A29932F08D3a7a510f4a5779f10B71bbA",
                5,
            )),
            request_manager: Arc::new(MockRequestManager::new()),
            fill_manager: Arc::new(MockFillManager::new(100)),
            token: Arc::new(MockTokenContract::new()),
        }
    }

    /// Trait-object view used by the lifecycle.
    ///
    /// Scan pacing is tightened so test lifecycles poll in milliseconds
    /// and give up after two seconds instead of hanging.
    pub fn services(&self) -> ChainServices {
        ChainServices::new(
            self.wallet.clone(),
            self.request_manager.clone(),
            self.fill_manager.clone(),
            self.token.clone(),
        )
        .with_scan_config(crate::transfer::fulfillment::ScanConfig {
            chunk_size: 100,
            min_chunk_size: 2,
            poll_interval_ms: 1,
            max_wait_secs: Some(2),
        })
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}
