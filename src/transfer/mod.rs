//! Cross-chain transfer lifecycle
//!
//! Drives a token transfer from request creation on the source chain to
//! fulfillment on the target chain, with withdrawal of expired requests
//! as the recovery path.
//!
//! # Phases
//!
//! ```text
//! ensure allowance → submit request → read request id → wait for fill
//!        ↓                 ↓                ↓                ↓
//!     (failed)          (failed)        (failed)      (failed/expired → withdraw)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Record-Before-Advance**: Every on-chain action lands in a step entity
//!    before the next phase runs, so a resumed transfer never repeats it
//! 2. **Set-Once Steps**: Step entity fields reject overwrites; a conflicting
//!    write is a bug in the driver, not a recoverable condition
//! 3. **At-Most-Once Events**: `Completed` and `Failed` fire at most once per
//!    in-memory transfer instance, no matter how often `execute` is retried
//! 4. **No Withdraw After Fill**: A fulfilled transfer never releases source
//!    funds back to the sender

pub mod error;
pub mod events;
pub mod fulfillment;
pub mod lifecycle;
pub mod steps;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use error::TransferError;
pub use events::{EventObservers, ListenerId, TransferEvent, TransferEventKind};
pub use fulfillment::{ScanConfig, wait_for_request_fill};
pub use lifecycle::{Transfer, TransferData, TransferParams};
pub use steps::{
    AllowanceInformation, RequestFulfillment, RequestInformation, StepError,
    TransactionInformation, WithdrawInformation,
};
