//! Waybridge - Cross-Chain Transfer Lifecycle
//!
//! Drives token transfers between rollups: request on the source chain,
//! fulfillment watch on the target chain, withdrawal when a request
//! expires unfilled. Transfers persist as JSON and resume mid-lifecycle.
//!
//! # Modules
//!
//! - [`uint256`] - 256-bit unsigned amounts with decimal parsing/formatting
//! - [`token`] - Token, chain and token-amount value objects
//! - [`adapters`] - Traits over the wallet and the bridge contracts
//! - [`transfer`] - The transfer lifecycle itself
//! - [`history`] - JSON-backed transfer store with resume
//! - [`config`] - YAML application configuration
//! - [`logging`] - Tracing setup with a rolling file appender

// Amount primitives - everything else builds on these
pub mod token;
pub mod uint256;

// Chain access
pub mod adapters;

// Lifecycle and persistence
pub mod history;
pub mod transfer;

// App plumbing
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use adapters::{
    ChainError, ChainServices, CreateRequestParams, FillManager, RequestCreatedEvent,
    RequestFilledEvent, RequestManager, TokenContract, WalletProvider,
};
pub use config::{AppConfig, ConfigError};
pub use history::{HistoryError, TransferHistory};
pub use token::{Address, Chain, ChainId, Token, TokenAmount, TransactionHash};
pub use transfer::{
    ScanConfig, Transfer, TransferData, TransferError, TransferEvent, TransferEventKind,
    TransferParams,
};
pub use uint256::{UInt256, UInt256Error};
