//! Transfer lifecycle
//!
//! [`Transfer`] is the aggregate root: it owns the immutable request
//! parameters, one optional slot per step-information entity and the
//! observer list for terminal events. `execute()` drives the phases
//! Allowance -> Request submission -> Fulfillment wait strictly in order,
//! skipping any phase whose step information is already attached, which is
//! what makes a reloaded transfer resume where it left off.
//!
//! State is a set of derived booleans, not an enum: `completed`, `failed`,
//! `withdrawn` and `expired` each come from one owned fact (an attached
//! entity, a stored message, the clock), so persistence cannot get them
//! out of sync.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapters::{ChainError, ChainServices, CreateRequestParams, RequestManager};
use crate::token::{Address, Chain, Token, TokenAmount};
use crate::transfer::error::TransferError;
use crate::transfer::events::{EventObservers, ListenerId, TransferEvent, TransferEventKind};
use crate::transfer::fulfillment::{ScanConfig, wait_for_request_fill};
use crate::transfer::steps::{
    AllowanceInformation, RequestFulfillment, RequestInformation, TransactionInformation,
    WithdrawInformation,
};
use crate::uint256::UInt256;

/// Extra scan time past the validity period, covering clock skew between
/// the local machine and the chains
const FULFILLMENT_GRACE_SECS: u64 = 60;

/// Input for [`Transfer::create`]
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub source_chain: Chain,
    pub source_amount: TokenAmount,
    pub target_chain: Chain,
    pub target_token: Token,
    pub target_account: Address,
    pub request_creator_address: Address,
    /// Seconds the request stays claimable before it can be withdrawn
    pub validity_period: UInt256,
}

/// Persisted form of a [`Transfer`].
///
/// Amounts are decimal strings, keys are camelCase. Step entities appear
/// only once attached. Failure state and listeners are deliberately not
/// part of the record: a reloaded transfer is resumable and starts with an
/// empty observer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferData {
    pub source_chain: Chain,
    pub source_amount: TokenAmount,
    pub target_chain: Chain,
    pub target_amount: TokenAmount,
    pub target_account: Address,
    pub request_creator_address: Address,
    pub fees: TokenAmount,
    pub validity_period: UInt256,
    /// Creation time, unix millis; `expired` is derived from it
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowance_information: Option<AllowanceInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_information: Option<TransactionInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_information: Option<RequestInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_fulfillment: Option<RequestFulfillment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdraw_information: Option<WithdrawInformation>,
}

/// One cross-chain token transfer, from request to fulfillment or
/// withdrawal
#[derive(Debug)]
pub struct Transfer {
    source_chain: Chain,
    source_amount: TokenAmount,
    target_chain: Chain,
    target_amount: TokenAmount,
    target_account: Address,
    request_creator_address: Address,
    fees: TokenAmount,
    validity_period: UInt256,
    date: i64,

    allowance_information: Option<AllowanceInformation>,
    transaction_information: Option<TransactionInformation>,
    request_information: Option<RequestInformation>,
    request_fulfillment: Option<RequestFulfillment>,
    withdraw_information: Option<WithdrawInformation>,

    failure_message: Option<String>,
    observers: EventObservers,
    completed_event_fired: bool,
    failed_event_fired: bool,
}

impl Transfer {
    /// Create a new transfer, quoting the protocol fee.
    ///
    /// The fee is quoted exactly once here and stored; later phases use
    /// the stored amount, never a re-quote.
    pub async fn create(
        params: TransferParams,
        request_manager: &dyn RequestManager,
    ) -> Result<Self, TransferError> {
        let fee = request_manager
            .get_request_fee(params.target_chain.identifier, params.source_amount.uint256())
            .await?;
        let fees = TokenAmount::new(fee, params.source_amount.token().clone());
        let target_amount =
            TokenAmount::new(params.source_amount.uint256().clone(), params.target_token);

        info!(
            "Created transfer: {} from {} to {} (fee {})",
            params.source_amount.formatted_amount(),
            params.source_chain.name,
            params.target_chain.name,
            fees.formatted_amount()
        );

        Ok(Self {
            source_chain: params.source_chain,
            source_amount: params.source_amount,
            target_chain: params.target_chain,
            target_amount,
            target_account: params.target_account,
            request_creator_address: params.request_creator_address,
            fees,
            validity_period: params.validity_period,
            date: Utc::now().timestamp_millis(),
            allowance_information: None,
            transaction_information: None,
            request_information: None,
            request_fulfillment: None,
            withdraw_information: None,
            failure_message: None,
            observers: EventObservers::new(),
            completed_event_fired: false,
            failed_event_fired: false,
        })
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    /// Fulfillment was observed on the target chain
    pub fn completed(&self) -> bool {
        self.request_fulfillment.is_some()
    }

    /// The last `execute()` call recorded a phase failure
    pub fn failed(&self) -> bool {
        self.failure_message.is_some()
    }

    /// The request's funds were reclaimed on the source chain
    pub fn withdrawn(&self) -> bool {
        self.withdraw_information.is_some()
    }

    /// The validity period elapsed without fulfillment. Derived from the
    /// clock on every call, never stored.
    pub fn expired(&self) -> bool {
        !self.completed() && (Utc::now().timestamp_millis() as i128) > self.expires_at_millis()
    }

    pub fn done(&self) -> bool {
        self.completed() || self.failed() || self.withdrawn()
    }

    pub fn pending(&self) -> bool {
        !self.done()
    }

    /// Human-readable reason of the last recorded phase failure
    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    fn expires_at_millis(&self) -> i128 {
        self.date as i128 + self.validity_period.saturating_u64() as i128 * 1000
    }

    fn remaining_validity_secs(&self) -> u64 {
        let remaining = self.expires_at_millis() - Utc::now().timestamp_millis() as i128;
        (remaining.max(0) / 1000) as u64
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn source_chain(&self) -> &Chain {
        &self.source_chain
    }

    pub fn source_amount(&self) -> &TokenAmount {
        &self.source_amount
    }

    pub fn target_chain(&self) -> &Chain {
        &self.target_chain
    }

    pub fn target_amount(&self) -> &TokenAmount {
        &self.target_amount
    }

    pub fn target_account(&self) -> &str {
        &self.target_account
    }

    pub fn request_creator_address(&self) -> &str {
        &self.request_creator_address
    }

    pub fn fees(&self) -> &TokenAmount {
        &self.fees
    }

    pub fn validity_period(&self) -> &UInt256 {
        &self.validity_period
    }

    /// Creation time, unix millis
    pub fn date(&self) -> i64 {
        self.date
    }

    pub fn allowance_information(&self) -> Option<&AllowanceInformation> {
        self.allowance_information.as_ref()
    }

    pub fn transaction_information(&self) -> Option<&TransactionInformation> {
        self.transaction_information.as_ref()
    }

    pub fn request_information(&self) -> Option<&RequestInformation> {
        self.request_information.as_ref()
    }

    pub fn request_fulfillment(&self) -> Option<&RequestFulfillment> {
        self.request_fulfillment.as_ref()
    }

    pub fn withdraw_information(&self) -> Option<&WithdrawInformation> {
        self.withdraw_information.as_ref()
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn subscribe<F>(&mut self, kind: TransferEventKind, callback: F) -> ListenerId
    where
        F: FnMut(&TransferEvent) + Send + 'static,
    {
        self.observers.subscribe(kind, callback)
    }

    pub fn subscribe_once<F>(&mut self, kind: TransferEventKind, callback: F) -> ListenerId
    where
        F: FnMut(&TransferEvent) + Send + 'static,
    {
        self.observers.subscribe_once(kind, callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn remove_all_listeners(&mut self) {
        self.observers.remove_all_listeners();
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drive the transfer towards fulfillment.
    ///
    /// Runs Allowance -> Request submission -> Fulfillment wait, skipping
    /// every phase whose step information is already attached, so the call
    /// is safe to repeat and resumes a reloaded transfer at the right
    /// phase. A fresh call clears the previous failure first; retry is
    /// always an explicit caller action.
    ///
    /// Operational failures (chain calls, missing receipt event, scan
    /// timeout) are recorded on the transfer, reported through the failed
    /// event and return `Ok(())`. Only contract violations return `Err`.
    pub async fn execute(&mut self, services: &ChainServices) -> Result<(), TransferError> {
        self.failure_message = None;

        match self.run_phases(services).await {
            Ok(()) => {
                if self.completed() && !self.completed_event_fired {
                    self.completed_event_fired = true;
                    self.observers.emit(&TransferEvent::Completed);
                }
                Ok(())
            }
            Err(err) if err.is_contract_violation() => Err(err),
            Err(err) => {
                self.record_failure(err.to_string());
                Ok(())
            }
        }
    }

    async fn run_phases(&mut self, services: &ChainServices) -> Result<(), TransferError> {
        self.ensure_allowance(services).await?;
        self.ensure_request_submitted(services).await?;
        self.ensure_request_information(services).await?;
        self.wait_for_fulfillment(services).await?;
        Ok(())
    }

    /// Phase 1: make sure the request manager may pull amount plus fee.
    ///
    /// Skipped when allowance information is already attached or the
    /// on-chain allowance covers the total; the skip is what makes resume
    /// idempotent.
    async fn ensure_allowance(&mut self, services: &ChainServices) -> Result<(), TransferError> {
        if self.allowance_information.is_some() {
            debug!("Allowance already attached, skipping approval");
            return Ok(());
        }

        self.ensure_source_chain(services).await?;

        let owner = services.wallet.signer_address().await?;
        let spender = &self.source_chain.request_manager_address;
        let total = self.source_amount.uint256().add(self.fees.uint256());

        let current = services.token.allowance(&owner, spender).await?;
        if current >= total {
            debug!("On-chain allowance {} covers {}, skipping approval", current, total);
            return Ok(());
        }

        info!("Approving {} base units for {}", total, spender);
        let tx_hash = services.token.approve(spender, &total).await?;

        let mut allowance = AllowanceInformation::new();
        allowance.set_transaction_hash(tx_hash)?;
        self.allowance_information = Some(allowance);
        Ok(())
    }

    /// Phase 2a: submit the request transaction if it never went out
    async fn ensure_request_submitted(
        &mut self,
        services: &ChainServices,
    ) -> Result<(), TransferError> {
        if self
            .transaction_information
            .as_ref()
            .is_some_and(|info| info.transaction_hash().is_some())
        {
            debug!("Request transaction already submitted, skipping");
            return Ok(());
        }

        self.ensure_source_chain(services).await?;

        let params = CreateRequestParams {
            target_chain_id: self.target_chain.identifier,
            source_token_address: self.source_amount.token().address.clone(),
            target_token_address: self.target_amount.token().address.clone(),
            target_account: self.target_account.clone(),
            amount: self.source_amount.uint256().clone(),
            validity_period: self.validity_period.clone(),
        };

        info!(
            "Submitting transfer request on {} for {}",
            self.source_chain.name,
            self.source_amount.formatted_amount()
        );
        let tx_hash = services.request_manager.create_request(&params).await?;

        let transaction = self
            .transaction_information
            .get_or_insert_with(TransactionInformation::new);
        transaction.set_transaction_hash(tx_hash)?;
        Ok(())
    }

    /// Phase 2b: derive the request identifier from the receipt event.
    ///
    /// Separate from submission so a crash between the two resumes here
    /// instead of double-submitting.
    async fn ensure_request_information(
        &mut self,
        services: &ChainServices,
    ) -> Result<(), TransferError> {
        if self
            .request_information
            .as_ref()
            .is_some_and(|info| info.identifier().is_some())
        {
            debug!("Request identifier already known, skipping receipt read");
            return Ok(());
        }

        let tx_hash = self.request_transaction_hash()?;
        let event = services
            .request_manager
            .read_request_created(&tx_hash)
            .await?
            .ok_or_else(|| {
                TransferError::RequestCreationFailed(format!(
                    "transaction {} carries no RequestCreated event",
                    tx_hash
                ))
            })?;

        info!("Request {} created in block {}", event.request_id, event.block_number);
        match &mut self.request_information {
            Some(existing) => existing.set_identifier(event.request_id)?,
            None => {
                let mut info =
                    RequestInformation::new(tx_hash, self.request_creator_address.clone());
                info.set_identifier(event.request_id)?;
                self.request_information = Some(info);
            }
        }
        Ok(())
    }

    /// Phase 3: scan the target chain until the request is filled
    async fn wait_for_fulfillment(
        &mut self,
        services: &ChainServices,
    ) -> Result<(), TransferError> {
        if self.request_fulfillment.is_some() {
            debug!("Fulfillment already observed, nothing to wait for");
            return Ok(());
        }

        let request_id = self
            .request_information
            .as_ref()
            .and_then(|info| info.identifier())
            .cloned()
            .ok_or(TransferError::MissingRequestIdentifier)?;

        // Scan from the request's own block; re-reading it from the
        // receipt keeps block numbers out of the persisted record.
        let tx_hash = self.request_transaction_hash()?;
        let from_block = services
            .request_manager
            .read_request_created(&tx_hash)
            .await?
            .map(|event| event.block_number)
            .ok_or_else(|| {
                TransferError::RequestCreationFailed(format!(
                    "transaction {} carries no RequestCreated event",
                    tx_hash
                ))
            })?;

        let scan = self.scan_window(&services.scan);
        info!(
            "Waiting for request {} to be filled on {} (from block {})",
            request_id, self.target_chain.name, from_block
        );
        let fill = wait_for_request_fill(
            services.fill_manager.as_ref(),
            &request_id,
            from_block,
            &scan,
        )
        .await?;

        let mut fulfillment = RequestFulfillment::new(Utc::now().timestamp_millis());
        fulfillment.set_filler(fill.filler)?;
        fulfillment.set_transaction_hash(fill.transaction_hash)?;
        self.request_fulfillment = Some(fulfillment);
        Ok(())
    }

    /// Reclaim funds of an expired, unfulfilled request.
    ///
    /// Local guards reject fulfilled or already-withdrawn transfers; the
    /// contract is the authority on everything else (a too-early call
    /// reverts on chain). Failures never touch `completed`/`failed` and
    /// leave the method retryable.
    pub async fn withdraw(&mut self, services: &ChainServices) -> Result<(), TransferError> {
        if self.completed() {
            return Err(TransferError::NotWithdrawable(
                "request was fulfilled".to_string(),
            ));
        }
        if self.withdrawn() {
            return Err(TransferError::NotWithdrawable(
                "funds already withdrawn".to_string(),
            ));
        }

        let request_id = self
            .request_information
            .as_ref()
            .and_then(|info| info.identifier())
            .cloned()
            .ok_or(TransferError::MissingRequestIdentifier)?;

        self.ensure_source_chain(services)
            .await
            .map_err(|e| TransferError::WithdrawalFailed(e.to_string()))?;

        info!("Withdrawing expired request {}", request_id);
        match services
            .request_manager
            .withdraw_expired_request(&request_id)
            .await
        {
            Ok(tx_hash) => {
                self.withdraw_information = Some(WithdrawInformation::new(tx_hash));
                Ok(())
            }
            Err(e) => Err(TransferError::WithdrawalFailed(e.to_string())),
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Snapshot for persistence. Listeners, event flags and failure state
    /// stay behind.
    pub fn encode(&self) -> TransferData {
        TransferData {
            source_chain: self.source_chain.clone(),
            source_amount: self.source_amount.clone(),
            target_chain: self.target_chain.clone(),
            target_amount: self.target_amount.clone(),
            target_account: self.target_account.clone(),
            request_creator_address: self.request_creator_address.clone(),
            fees: self.fees.clone(),
            validity_period: self.validity_period.clone(),
            date: self.date,
            allowance_information: self.allowance_information.clone(),
            transaction_information: self.transaction_information.clone(),
            request_information: self.request_information.clone(),
            request_fulfillment: self.request_fulfillment.clone(),
            withdraw_information: self.withdraw_information.clone(),
        }
    }

    /// Rebuild a transfer from its persisted form. `execute()` on the
    /// result resumes at the first phase without attached information.
    pub fn decode(data: TransferData) -> Self {
        Self {
            source_chain: data.source_chain,
            source_amount: data.source_amount,
            target_chain: data.target_chain,
            target_amount: data.target_amount,
            target_account: data.target_account,
            request_creator_address: data.request_creator_address,
            fees: data.fees,
            validity_period: data.validity_period,
            date: data.date,
            allowance_information: data.allowance_information,
            transaction_information: data.transaction_information,
            request_information: data.request_information,
            request_fulfillment: data.request_fulfillment,
            withdraw_information: data.withdraw_information,
            failure_message: None,
            observers: EventObservers::new(),
            completed_event_fired: false,
            failed_event_fired: false,
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn ensure_source_chain(&self, services: &ChainServices) -> Result<(), ChainError> {
        let connected = services.wallet.chain_id().await?;
        if connected != self.source_chain.identifier {
            info!(
                "Switching wallet from chain {} to chain {}",
                connected, self.source_chain.identifier
            );
            services
                .wallet
                .switch_chain(self.source_chain.identifier)
                .await?;
        }
        Ok(())
    }

    fn request_transaction_hash(&self) -> Result<String, TransferError> {
        self.transaction_information
            .as_ref()
            .and_then(|info| info.transaction_hash())
            .map(str::to_string)
            .ok_or_else(|| {
                TransferError::RequestCreationFailed(
                    "request transaction hash is missing".to_string(),
                )
            })
    }

    /// Bound the fulfillment scan: an explicit `max_wait_secs` wins,
    /// otherwise the remaining validity period plus a grace margin.
    fn scan_window(&self, base: &ScanConfig) -> ScanConfig {
        let mut scan = base.clone();
        if scan.max_wait_secs.is_none() {
            scan.max_wait_secs = Some(self.remaining_validity_secs() + FULFILLMENT_GRACE_SECS);
        }
        scan
    }

    fn record_failure(&mut self, message: String) {
        warn!("Transfer failed: {}", message);
        self.failure_message = Some(message.clone());
        if !self.failed_event_fired {
            self.failed_event_fired = true;
            self.observers.emit(&TransferEvent::Failed { message });
        }
    }
}
