//! Transfer Error Types
//!
//! One enum for everything the lifecycle can fail with. The split that
//! matters is [`TransferError::is_contract_violation`]: operational
//! failures (chain calls, timeouts) are recorded on the transfer and
//! reported through the failed event, while contract violations escape as
//! `Err` because they mean the caller or a phase broke sequencing rules.

use thiserror::Error;

use crate::adapters::ChainError;
use crate::transfer::steps::StepError;
use crate::uint256::UInt256Error;

/// Transfer lifecycle errors
#[derive(Debug, Error)]
pub enum TransferError {
    // === Operational failures (recorded, not propagated by execute) ===
    #[error("Request creation failed: {0}")]
    RequestCreationFailed(String),

    #[error("Withdrawal failed: {0}")]
    WithdrawalFailed(String),

    #[error("Timed out after {0}s waiting for the request to be filled")]
    FulfillmentTimeout(u64),

    #[error(transparent)]
    Chain(#[from] ChainError),

    // === Input errors ===
    #[error(transparent)]
    Amount(#[from] UInt256Error),

    // === Contract violations (propagated) ===
    #[error("Request identifier is not known")]
    MissingRequestIdentifier,

    #[error("Transfer is not withdrawable: {0}")]
    NotWithdrawable(String),

    #[error(transparent)]
    Step(#[from] StepError),
}

impl TransferError {
    /// Sequencing and misuse errors, as opposed to operational failures.
    ///
    /// Contract violations escape `execute()` as `Err`; everything else is
    /// stored as the transfer's failure message and emitted as a failed
    /// event instead.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TransferError::MissingRequestIdentifier
                | TransferError::NotWithdrawable(_)
                | TransferError::Step(_)
        )
    }
}
