//! Step information entities
//!
//! Each lifecycle phase leaves behind a small record of what happened on
//! chain. Fields that are unknown at creation time start empty and are
//! attached exactly once; a second write is a programming error and fails
//! with [`StepError::AlreadySet`] instead of silently overwriting evidence.
//!
//! All entities serialize to camelCase JSON and survive an encode/decode
//! round trip with unset fields absent, which is what makes transfer
//! persistence and resumption work.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::{Address, TransactionHash};
use crate::uint256::UInt256;

/// Step entity mutation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("{entity}.{field} already set")]
    AlreadySet {
        entity: &'static str,
        field: &'static str,
    },
}

/// Write `value` into an empty slot, or fail if evidence is already there.
fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    entity: &'static str,
    field: &'static str,
) -> Result<(), StepError> {
    if slot.is_some() {
        return Err(StepError::AlreadySet { entity, field });
    }
    *slot = Some(value);
    Ok(())
}

// ============================================================================
// Allowance
// ============================================================================

/// Record of the ERC-20 approval that precedes a request.
///
/// Created empty when the allowance phase starts; hashes attach as the
/// approval transaction goes out. `internal_transaction_hash` exists for
/// meta-transaction wallets whose externally visible hash differs from the
/// submitted one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<TransactionHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    internal_transaction_hash: Option<TransactionHash>,
}

impl AllowanceInformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.transaction_hash.as_deref()
    }

    pub fn internal_transaction_hash(&self) -> Option<&str> {
        self.internal_transaction_hash.as_deref()
    }

    pub fn set_transaction_hash(&mut self, hash: TransactionHash) -> Result<(), StepError> {
        set_once(
            &mut self.transaction_hash,
            hash,
            "AllowanceInformation",
            "transaction_hash",
        )
    }

    pub fn set_internal_transaction_hash(
        &mut self,
        hash: TransactionHash,
    ) -> Result<(), StepError> {
        set_once(
            &mut self.internal_transaction_hash,
            hash,
            "AllowanceInformation",
            "internal_transaction_hash",
        )
    }
}

// ============================================================================
// Request submission transaction
// ============================================================================

/// Record of the request-submission transaction itself, before the on-chain
/// event (and with it the request identifier) is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<TransactionHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    internal_transaction_hash: Option<TransactionHash>,
}

impl TransactionInformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.transaction_hash.as_deref()
    }

    pub fn internal_transaction_hash(&self) -> Option<&str> {
        self.internal_transaction_hash.as_deref()
    }

    pub fn set_transaction_hash(&mut self, hash: TransactionHash) -> Result<(), StepError> {
        set_once(
            &mut self.transaction_hash,
            hash,
            "TransactionInformation",
            "transaction_hash",
        )
    }

    pub fn set_internal_transaction_hash(
        &mut self,
        hash: TransactionHash,
    ) -> Result<(), StepError> {
        set_once(
            &mut self.internal_transaction_hash,
            hash,
            "TransactionInformation",
            "internal_transaction_hash",
        )
    }
}

// ============================================================================
// Confirmed request
// ============================================================================

/// The request as confirmed on the source chain.
///
/// Transaction hash and requester account are known at creation; the
/// request identifier attaches once the RequestCreated event is decoded
/// from the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInformation {
    transaction_hash: TransactionHash,
    request_account: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<UInt256>,
}

impl RequestInformation {
    pub fn new(transaction_hash: TransactionHash, request_account: Address) -> Self {
        Self {
            transaction_hash,
            request_account,
            identifier: None,
        }
    }

    pub fn transaction_hash(&self) -> &str {
        &self.transaction_hash
    }

    pub fn request_account(&self) -> &str {
        &self.request_account
    }

    pub fn identifier(&self) -> Option<&UInt256> {
        self.identifier.as_ref()
    }

    pub fn set_identifier(&mut self, identifier: UInt256) -> Result<(), StepError> {
        set_once(
            &mut self.identifier,
            identifier,
            "RequestInformation",
            "identifier",
        )
    }
}

// ============================================================================
// Fulfillment observation
// ============================================================================

/// Observation of the RequestFilled event on the target chain.
///
/// The timestamp (unix millis) marks when the fill was observed, not when it
/// was mined. Filler and transaction hash attach from the decoded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFulfillment {
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filler: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<TransactionHash>,
}

impl RequestFulfillment {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            filler: None,
            transaction_hash: None,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn filler(&self) -> Option<&str> {
        self.filler.as_deref()
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.transaction_hash.as_deref()
    }

    pub fn set_filler(&mut self, filler: Address) -> Result<(), StepError> {
        set_once(&mut self.filler, filler, "RequestFulfillment", "filler")
    }

    pub fn set_transaction_hash(&mut self, hash: TransactionHash) -> Result<(), StepError> {
        set_once(
            &mut self.transaction_hash,
            hash,
            "RequestFulfillment",
            "transaction_hash",
        )
    }
}

// ============================================================================
// Withdrawal
// ============================================================================

/// Record of reclaiming an expired request's funds on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawInformation {
    transaction_hash: TransactionHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    internal_transaction_hash: Option<TransactionHash>,
}

impl WithdrawInformation {
    pub fn new(transaction_hash: TransactionHash) -> Self {
        Self {
            transaction_hash,
            internal_transaction_hash: None,
        }
    }

    pub fn transaction_hash(&self) -> &str {
        &self.transaction_hash
    }

    pub fn internal_transaction_hash(&self) -> Option<&str> {
        self.internal_transaction_hash.as_deref()
    }

    pub fn set_internal_transaction_hash(
        &mut self,
        hash: TransactionHash,
    ) -> Result<(), StepError> {
        set_once(
            &mut self.internal_transaction_hash,
            hash,
            "WithdrawInformation",
            "internal_transaction_hash",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_once_then_reject() {
        let mut info = AllowanceInformation::new();
        assert_eq!(info.transaction_hash(), None);

        info.set_transaction_hash("0xaaa".to_string()).unwrap();
        assert_eq!(info.transaction_hash(), Some("0xaaa"));

        let err = info.set_transaction_hash("0xbbb".to_string()).unwrap_err();
        assert_eq!(
            err,
            StepError::AlreadySet {
                entity: "AllowanceInformation",
                field: "transaction_hash",
            }
        );
        // First value is untouched
        assert_eq!(info.transaction_hash(), Some("0xaaa"));
    }

    #[test]
    fn test_fields_set_once_independently() {
        let mut info = TransactionInformation::new();
        info.set_transaction_hash("0x1".to_string()).unwrap();
        // The sibling field is still writable
        info.set_internal_transaction_hash("0x2".to_string())
            .unwrap();
        assert!(info.set_internal_transaction_hash("0x3".to_string()).is_err());
    }

    #[test]
    fn test_request_identifier_set_once() {
        let mut req = RequestInformation::new("0xreq".to_string(), "0xme".to_string());
        assert_eq!(req.identifier(), None);

        req.set_identifier(UInt256::from(7u64)).unwrap();
        assert_eq!(req.identifier(), Some(&UInt256::from(7u64)));
        assert!(req.set_identifier(UInt256::from(8u64)).is_err());
    }

    #[test]
    fn test_serde_roundtrip_partial() {
        // Only the set fields appear on the wire
        let mut req = RequestInformation::new("0xreq".to_string(), "0xme".to_string());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["transactionHash"], "0xreq");
        assert_eq!(json["requestAccount"], "0xme");
        assert!(json.get("identifier").is_none());

        req.set_identifier(UInt256::from(7u64)).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["identifier"], "7");

        let back: RequestInformation = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_serde_roundtrip_fulfillment() {
        let mut fill = RequestFulfillment::new(1_700_000_000_000);
        fill.set_filler("0xfiller".to_string()).unwrap();
        fill.set_transaction_hash("0xfill".to_string()).unwrap();

        let json = serde_json::to_string(&fill).unwrap();
        let back: RequestFulfillment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fill);
        assert_eq!(back.timestamp(), 1_700_000_000_000);
    }

    #[test]
    fn test_withdraw_information() {
        let mut w = WithdrawInformation::new("0xw".to_string());
        assert_eq!(w.transaction_hash(), "0xw");
        w.set_internal_transaction_hash("0xi".to_string()).unwrap();
        assert!(w.set_internal_transaction_hash("0xj".to_string()).is_err());

        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["internalTransactionHash"], "0xi");
    }
}
