//! Integration Tests for the Transfer Lifecycle
//!
//! These tests drive complete transfers against the mock chain bundle:
//! approval, request submission, fulfillment scan, failure recording,
//! resume from a persisted snapshot and withdrawal of expired requests.

#[cfg(test)]
mod lifecycle_integration_tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::adapters::mock::MockChain;
    use crate::adapters::{ChainServices, RequestFilledEvent};
    use crate::token::{Chain, Token, TokenAmount};
    use crate::transfer::fulfillment::ScanConfig;
    use crate::transfer::lifecycle::{Transfer, TransferParams};
    use crate::transfer::{TransferError, TransferEvent, TransferEventKind};
    use crate::uint256::UInt256;

    fn test_token(decimals: u32) -> Token {
        Token {
            address: "0x0b9C0bC1c9d9E6251c4E12e6a4e2b05d2D4D7a10".to_string(),
            symbol: "TST".to_string(),
            decimals,
        }
    }

    fn test_chain(id: u64, name: &str) -> Chain {
        Chain {
            identifier: id,
            name: name.to_string(),
            rpc_url: format!("http://localhost:{}", 8545 + id),
            request_manager_address: format!("0xmanager{}", id),
            fill_manager_address: format!("0xfill{}", id),
            explorer_transaction_url: format!("https://explorer{}.test/tx/", id),
        }
    }

    /// Params for a transfer leaving from `source_id`. The mock wallet
    /// starts on chain 5, so `source_id != 5` forces a network switch.
    fn transfer_params(source_id: u64) -> TransferParams {
        TransferParams {
            source_chain: test_chain(source_id, "Source"),
            source_amount: TokenAmount::parse("10", test_token(2)).unwrap(),
            target_chain: test_chain(10, "Target"),
            target_token: test_token(2),
            target_account: "0xabc0000000000000000000000000000000000abc".to_string(),
            request_creator_address: "0x00d5206A29932F08D3a7a510f4a5779f10B71bbA".to_string(),
            validity_period: UInt256::from(600u64),
        }
    }

    fn fill_event(request_id: u64, block_number: u64) -> RequestFilledEvent {
        RequestFilledEvent {
            request_id: UInt256::from(request_id),
            filler: "0xf111000000000000000000000000000000000f11".to_string(),
            transaction_hash: format!("0xfilltx{}", request_id),
            block_number,
        }
    }

    /// Services over the same mocks with a custom scan deadline.
    /// `max_wait_secs: 0` makes the fulfillment scan give up immediately,
    /// which is the quickest way to strand a transfer mid-lifecycle.
    fn services_with_max_wait(chain: &MockChain, max_wait_secs: u64) -> ChainServices {
        ChainServices::new(
            chain.wallet.clone(),
            chain.request_manager.clone(),
            chain.fill_manager.clone(),
            chain.token.clone(),
        )
        .with_scan_config(ScanConfig {
            chunk_size: 100,
            min_chunk_size: 2,
            poll_interval_ms: 1,
            max_wait_secs: Some(max_wait_secs),
        })
    }

    // ========================================================================
    // Happy Path
    // ========================================================================

    /// Full lifecycle: approve, submit, read the request id from the
    /// receipt, observe the fill, emit completed exactly once.
    #[tokio::test]
    async fn test_full_lifecycle_completes() {
        let chain = MockChain::new();
        chain.request_manager.set_fee(UInt256::from(3u64));
        chain.request_manager.set_next_request_id(UInt256::from(7u64));
        chain.fill_manager.script_fill(fill_event(7, 100));

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();

        let completed_hits = Arc::new(AtomicUsize::new(0));
        let failed_hits = Arc::new(AtomicUsize::new(0));
        let c = completed_hits.clone();
        transfer.subscribe(TransferEventKind::Completed, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let f = failed_hits.clone();
        transfer.subscribe(TransferEventKind::Failed, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        transfer.execute(&chain.services()).await.unwrap();

        assert!(transfer.completed());
        assert!(transfer.done());
        assert!(!transfer.failed());
        assert!(!transfer.expired());

        // Every phase left its step information behind
        assert_eq!(
            transfer.allowance_information().unwrap().transaction_hash(),
            Some("0xapprove1")
        );
        assert_eq!(
            transfer.transaction_information().unwrap().transaction_hash(),
            Some("0xcreate1")
        );
        let request = transfer.request_information().unwrap();
        assert_eq!(request.identifier(), Some(&UInt256::from(7u64)));
        assert_eq!(request.transaction_hash(), "0xcreate1");
        let fulfillment = transfer.request_fulfillment().unwrap();
        assert_eq!(
            fulfillment.filler(),
            Some("0xf111000000000000000000000000000000000f11")
        );
        assert_eq!(fulfillment.transaction_hash(), Some("0xfilltx7"));

        // One quote, one approval, one submission; wallet already on 5
        assert_eq!(chain.request_manager.fee_quote_count(), 1);
        assert_eq!(chain.token.approve_count(), 1);
        assert_eq!(chain.request_manager.create_count(), 1);
        assert!(chain.wallet.switch_history().is_empty());

        assert_eq!(completed_hits.load(Ordering::SeqCst), 1);
        assert_eq!(failed_hits.load(Ordering::SeqCst), 0);
    }

    /// Executing an already-completed transfer touches nothing and does
    /// not re-emit the completed event.
    #[tokio::test]
    async fn test_execute_after_completion_is_noop() {
        let chain = MockChain::new();
        chain.request_manager.set_next_request_id(UInt256::from(7u64));
        chain.fill_manager.script_fill(fill_event(7, 100));

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();
        let completed_hits = Arc::new(AtomicUsize::new(0));
        let c = completed_hits.clone();
        transfer.subscribe(TransferEventKind::Completed, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        transfer.execute(&chain.services()).await.unwrap();
        assert!(transfer.completed());

        let approvals = chain.token.approve_count();
        let submissions = chain.request_manager.create_count();
        let queries = chain.fill_manager.query_count();

        transfer.execute(&chain.services()).await.unwrap();

        assert_eq!(chain.token.approve_count(), approvals);
        assert_eq!(chain.request_manager.create_count(), submissions);
        assert_eq!(chain.fill_manager.query_count(), queries);
        assert_eq!(completed_hits.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // Resume
    // ========================================================================

    /// A transfer stranded after submission resumes from its snapshot
    /// without repeating the approval or the request transaction.
    #[tokio::test]
    async fn test_resume_skips_finished_phases() {
        let chain = MockChain::new();
        chain.request_manager.set_next_request_id(UInt256::from(9u64));

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();

        // No fill scripted and a zero deadline: the scan gives up at once
        transfer
            .execute(&services_with_max_wait(&chain, 0))
            .await
            .unwrap();

        assert!(transfer.failed());
        assert!(transfer.failure_message().unwrap().contains("Timed out"));
        assert_eq!(
            transfer.request_information().unwrap().identifier(),
            Some(&UInt256::from(9u64))
        );
        assert_eq!(chain.token.approve_count(), 1);
        assert_eq!(chain.request_manager.create_count(), 1);

        // Persist, reload, and let the fill arrive
        let mut resumed = Transfer::decode(transfer.encode());
        assert!(!resumed.failed());

        chain.fill_manager.script_fill(fill_event(9, 100));
        resumed.execute(&chain.services()).await.unwrap();

        assert!(resumed.completed());
        assert_eq!(chain.token.approve_count(), 1);
        assert_eq!(chain.request_manager.create_count(), 1);
    }

    // ========================================================================
    // Failure Recording
    // ========================================================================

    /// Operational failures land in the failure message and the failed
    /// event; `execute` still returns `Ok` and stays retryable.
    #[tokio::test]
    async fn test_failure_is_recorded_not_returned() {
        let chain = MockChain::new();
        chain.request_manager.set_fail_create(true);

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = messages.clone();
        transfer.subscribe(TransferEventKind::Failed, move |event| {
            if let TransferEvent::Failed { message } = event {
                captured.lock().unwrap().push(message.clone());
            }
        });

        let result = transfer.execute(&chain.services()).await;
        assert!(result.is_ok());
        assert!(transfer.failed());
        assert!(transfer.done());
        assert!(!transfer.pending());

        let message = transfer.failure_message().unwrap().to_string();
        assert!(message.contains("mock create_request revert"));
        assert_eq!(*messages.lock().unwrap(), vec![message]);

        // A second failing run re-records but does not re-emit
        transfer.execute(&chain.services()).await.unwrap();
        assert!(transfer.failed());
        assert_eq!(messages.lock().unwrap().len(), 1);

        // Clear the fault; the retry completes and the failure is gone
        chain.request_manager.set_fail_create(false);
        chain.request_manager.set_next_request_id(UInt256::from(3u64));
        chain.fill_manager.script_fill(fill_event(3, 100));

        transfer.execute(&chain.services()).await.unwrap();
        assert!(transfer.completed());
        assert!(!transfer.failed());
        assert_eq!(transfer.failure_message(), None);
    }

    /// A confirmed transaction without the expected receipt event is an
    /// operational failure; the transaction hash is kept so retries read
    /// the same receipt instead of submitting again.
    #[tokio::test]
    async fn test_missing_receipt_event_is_failure() {
        let chain = MockChain::new();
        chain.request_manager.set_omit_created_event(true);

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();
        transfer.execute(&chain.services()).await.unwrap();

        assert!(transfer.failed());
        assert!(
            transfer
                .failure_message()
                .unwrap()
                .contains("carries no RequestCreated event")
        );
        assert_eq!(
            transfer.transaction_information().unwrap().transaction_hash(),
            Some("0xcreate1")
        );
        assert!(transfer.request_information().is_none());

        // Retry re-reads the receipt of the recorded transaction
        transfer.execute(&chain.services()).await.unwrap();
        assert!(transfer.failed());
        assert_eq!(chain.request_manager.create_count(), 1);
    }

    /// A failed wallet switch aborts the lifecycle before any approval.
    #[tokio::test]
    async fn test_switch_chain_failure_is_operational() {
        let chain = MockChain::new();
        chain.wallet.set_fail_switch(true);

        // Source chain 7, wallet stuck on 5
        let mut transfer = Transfer::create(transfer_params(7), chain.request_manager.as_ref())
            .await
            .unwrap();
        transfer.execute(&chain.services()).await.unwrap();

        assert!(transfer.failed());
        assert!(transfer.failure_message().unwrap().contains("Wrong network"));
        assert_eq!(chain.token.approve_count(), 0);
        assert_eq!(chain.request_manager.create_count(), 0);
    }

    /// The wallet is moved to the source chain once, before the approval.
    #[tokio::test]
    async fn test_wallet_switched_to_source_chain() {
        let chain = MockChain::new();
        chain.request_manager.set_next_request_id(UInt256::from(4u64));
        chain.fill_manager.script_fill(fill_event(4, 100));

        let mut transfer = Transfer::create(transfer_params(7), chain.request_manager.as_ref())
            .await
            .unwrap();
        transfer.execute(&chain.services()).await.unwrap();

        assert!(transfer.completed());
        assert_eq!(chain.wallet.switch_history(), vec![7]);
    }

    // ========================================================================
    // Withdrawal
    // ========================================================================

    /// An expired, unfulfilled request can be withdrawn exactly once.
    #[tokio::test]
    async fn test_withdraw_after_expiry() {
        let chain = MockChain::new();
        chain.request_manager.set_next_request_id(UInt256::from(11u64));

        let mut params = transfer_params(5);
        params.validity_period = UInt256::zero();
        let mut transfer = Transfer::create(params, chain.request_manager.as_ref())
            .await
            .unwrap();

        // Strand it after submission; nothing ever fills a zero-validity
        // request
        transfer
            .execute(&services_with_max_wait(&chain, 0))
            .await
            .unwrap();
        assert!(transfer.failed());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(transfer.expired());
        assert!(!transfer.withdrawn());

        transfer.withdraw(&chain.services()).await.unwrap();
        assert!(transfer.withdrawn());
        assert!(transfer.done());
        assert_eq!(
            transfer.withdraw_information().unwrap().transaction_hash(),
            "0xwithdraw1"
        );
        assert_eq!(chain.request_manager.withdraw_count(), 1);

        // The second withdraw is rejected locally, not sent to the chain
        let err = transfer.withdraw(&chain.services()).await.unwrap_err();
        assert!(matches!(err, TransferError::NotWithdrawable(_)));
        assert_eq!(chain.request_manager.withdraw_count(), 1);
    }

    /// Fulfilled transfers never release source funds back.
    #[tokio::test]
    async fn test_withdraw_rejected_when_completed() {
        let chain = MockChain::new();
        chain.request_manager.set_next_request_id(UInt256::from(7u64));
        chain.fill_manager.script_fill(fill_event(7, 100));

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();
        transfer.execute(&chain.services()).await.unwrap();
        assert!(transfer.completed());

        let err = transfer.withdraw(&chain.services()).await.unwrap_err();
        assert!(matches!(err, TransferError::NotWithdrawable(_)));
        assert!(!transfer.withdrawn());
        assert_eq!(chain.request_manager.withdraw_count(), 0);
    }

    /// Withdrawing before the request id is known is a caller error.
    #[tokio::test]
    async fn test_withdraw_requires_request_identifier() {
        let chain = MockChain::new();
        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();

        let err = transfer.withdraw(&chain.services()).await.unwrap_err();
        assert!(matches!(err, TransferError::MissingRequestIdentifier));
        assert_eq!(chain.request_manager.withdraw_count(), 0);
    }

    /// A chain revert surfaces as `WithdrawalFailed` and leaves the
    /// transfer's lifecycle state untouched, so the call can be retried.
    #[tokio::test]
    async fn test_withdraw_failure_is_retryable() {
        let chain = MockChain::new();
        chain.request_manager.set_next_request_id(UInt256::from(2u64));

        let mut transfer = Transfer::create(transfer_params(5), chain.request_manager.as_ref())
            .await
            .unwrap();
        transfer
            .execute(&services_with_max_wait(&chain, 0))
            .await
            .unwrap();
        let message_before = transfer.failure_message().map(str::to_string);

        chain.request_manager.set_fail_withdraw(true);
        let err = transfer.withdraw(&chain.services()).await.unwrap_err();
        assert!(matches!(err, TransferError::WithdrawalFailed(_)));
        assert!(!transfer.withdrawn());
        // The stored failure message belongs to execute, not withdraw
        assert_eq!(
            transfer.failure_message().map(str::to_string),
            message_before
        );

        chain.request_manager.set_fail_withdraw(false);
        transfer.withdraw(&chain.services()).await.unwrap();
        assert!(transfer.withdrawn());
        assert_eq!(
            transfer.withdraw_information().unwrap().transaction_hash(),
            "0xwithdraw2"
        );
    }
}
