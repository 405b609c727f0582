//! Token, chain and token-amount value objects
//!
//! A [`TokenAmount`] binds a base-unit [`UInt256`] to the [`Token`] it is
//! denominated in, so display formatting and equality always use the right
//! number of decimals. Fields are private; use the accessors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::uint256::{UInt256, UInt256Error};

/// Hex-encoded account or contract address, `0x`-prefixed
pub type Address = String;

/// Hex-encoded transaction hash, `0x`-prefixed
pub type TransactionHash = String;

/// Numeric chain identifier (EIP-155)
pub type ChainId = u64;

/// ERC-20 token descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u32,
}

/// A rollup or L1 chain the bridge can operate on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub identifier: ChainId,
    pub name: String,
    pub rpc_url: String,
    pub request_manager_address: Address,
    pub fill_manager_address: Address,
    pub explorer_transaction_url: String,
}

impl Chain {
    /// Explorer link for a transaction on this chain
    pub fn transaction_url(&self, hash: &str) -> String {
        format!("{}{}", self.explorer_transaction_url, hash)
    }
}

/// An amount of a specific token, stored in base units
///
/// # Invariants
/// - `amount` is always in base units of `token` (multiplied out by
///   `token.decimals`)
/// - Two amounts are equal when they name the same token address and the
///   same base-unit value; symbol and decimals do not take part
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    amount: UInt256,
    token: Token,
}

impl TokenAmount {
    /// Wrap an existing base-unit amount
    pub fn new(amount: UInt256, token: Token) -> Self {
        Self { amount, token }
    }

    /// Parse a human-readable decimal string using the token's decimals.
    ///
    /// `TokenAmount::parse("1.5", tst)` with an 8-decimals token yields
    /// 150000000 base units. Digits beyond the token's precision truncate.
    pub fn parse(value: &str, token: Token) -> Result<Self, UInt256Error> {
        let amount = UInt256::parse(value, token.decimals)?;
        Ok(Self { amount, token })
    }

    /// Base-unit value
    pub fn uint256(&self) -> &UInt256 {
        &self.amount
    }

    /// The token this amount is denominated in
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Canonical decimal string, e.g. `"1.5"`
    pub fn decimal_amount(&self) -> String {
        self.amount.format(self.token.decimals)
    }

    /// Decimal string with the token symbol appended, e.g. `"1.5 TST"`
    pub fn formatted_amount(&self) -> String {
        format!("{} {}", self.decimal_amount(), self.token.symbol)
    }
}

impl PartialEq for TokenAmount {
    fn eq(&self, other: &Self) -> bool {
        self.token.address == other.token.address && self.amount == other.amount
    }
}

impl Eq for TokenAmount {}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted_amount())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_token() -> Token {
        Token {
            address: "0x0b9C0bC1c9d9E6251c4E12e6a4e2b05d2D4D7a10".to_string(),
            symbol: "TST".to_string(),
            decimals: 8,
        }
    }

    #[test]
    fn test_parse_uses_token_decimals() {
        let amount = TokenAmount::parse("1.5", test_token()).unwrap();
        assert_eq!(amount.uint256(), &UInt256::from(150_000_000u64));
        assert_eq!(amount.decimal_amount(), "1.5");
        assert_eq!(amount.formatted_amount(), "1.5 TST");
    }

    #[test]
    fn test_parse_truncates_beyond_token_precision() {
        let token = Token {
            decimals: 2,
            ..test_token()
        };
        let amount = TokenAmount::parse("10.567", token).unwrap();
        assert_eq!(amount.uint256(), &UInt256::from(1056u64));
        assert_eq!(amount.decimal_amount(), "10.56");
    }

    #[test]
    fn test_equality_is_address_and_value() {
        let a = TokenAmount::new(UInt256::from(100u64), test_token());
        let b = TokenAmount::new(UInt256::from(100u64), test_token());
        assert_eq!(a, b);

        // Symbol differences do not matter as long as the address matches
        let renamed = Token {
            symbol: "WRAPPED-TST".to_string(),
            ..test_token()
        };
        let c = TokenAmount::new(UInt256::from(100u64), renamed);
        assert_eq!(a, c);

        // Different value
        let d = TokenAmount::new(UInt256::from(101u64), test_token());
        assert_ne!(a, d);

        // Different token address
        let other = Token {
            address: "0xffffffffffffffffffffffffffffffffffffffff".to_string(),
            ..test_token()
        };
        let e = TokenAmount::new(UInt256::from(100u64), other);
        assert_ne!(a, e);
    }

    #[test]
    fn test_serde_shape() {
        let amount = TokenAmount::parse("1.5", test_token()).unwrap();
        let json = serde_json::to_value(&amount).unwrap();

        assert_eq!(json["amount"], "150000000");
        assert_eq!(json["token"]["symbol"], "TST");
        assert_eq!(json["token"]["decimals"], 8);

        let back: TokenAmount = serde_json::from_value(json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_chain_transaction_url() {
        let chain = Chain {
            identifier: 5,
            name: "Goerli".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            request_manager_address: "0x11".to_string(),
            fill_manager_address: "0x22".to_string(),
            explorer_transaction_url: "https://goerli.etherscan.io/tx/".to_string(),
        };
        assert_eq!(
            chain.transaction_url("0xabc"),
            "https://goerli.etherscan.io/tx/0xabc"
        );
    }
}
