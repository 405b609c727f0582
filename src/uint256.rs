//! Arbitrary-precision unsigned amounts
//!
//! All token amounts in the system are carried as [`UInt256`], a
//! non-negative arbitrary-precision integer in base units (wei-style).
//! Conversions between base units and human-readable decimal strings MUST
//! go through this module.
//!
//! ## Design Principles
//! 1. Never negative: construction and arithmetic reject negative results
//! 2. Never floating point: parse/format are exact string transformations
//! 3. Immutable: every operation returns a new value
//!
//! ## Usage
//! ```rust
//! use waybridge::uint256::UInt256;
//!
//! // Client sends "1.5" of an 8-decimals token
//! let internal = UInt256::parse("1.5", 8)?;
//! assert_eq!(internal, UInt256::from(150_000_000u64));
//!
//! // Display base units to the client
//! assert_eq!(internal.format(8), "1.5");
//! # Ok::<(), waybridge::uint256::UInt256Error>(())
//! ```

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_integer::Integer;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount conversion and arithmetic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UInt256Error {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Division by zero")]
    DivisionByZero,
}

/// Non-negative arbitrary-precision integer amount.
///
/// The name keeps the on-chain register (amounts live in 256-bit EVM words)
/// but the backing store is unbounded, so arithmetic never wraps.
///
/// # Invariants
/// - The value is never negative; operations that would go below zero
///   return [`UInt256Error::InvalidValue`] instead
/// - Values are immutable; `add`/`subtract`/`multiply`/`divide` return new
///   instances
/// - Comparisons (`<`, `<=`, `>=`) are the usual total order on integers
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UInt256(BigUint);

impl UInt256 {
    /// The zero amount
    pub fn zero() -> Self {
        Self(BigUint::from(0u32))
    }

    /// Check whether the amount is zero
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::from(0u32)
    }

    /// Big-endian magnitude bytes, no leading zeros (zero gives `[0]`)
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// Clamp to `u64`, saturating when the value does not fit
    pub fn saturating_u64(&self) -> u64 {
        u64::try_from(&self.0).unwrap_or(u64::MAX)
    }

    /// Parse a human-readable decimal string into base units.
    ///
    /// Interprets `value` as a decimal number and multiplies by
    /// `10^decimals`. Fractional digits beyond `decimals` places are
    /// truncated, not rounded and not rejected.
    ///
    /// # Errors
    /// - `InvalidValue` - negative input (leading `-`); negatives are
    ///   rejected everywhere, there is no signed amount type
    /// - `InvalidFormat` - anything that is not a plain decimal literal
    ///   (empty, `+` sign, exponents, `.5`, `5.`, multiple dots)
    ///
    /// # Example
    /// ```rust
    /// # use waybridge::uint256::UInt256;
    /// let amount = UInt256::parse("123.45", 2).unwrap();
    /// assert_eq!(amount, UInt256::from(12345u64));
    /// ```
    pub fn parse(value: &str, decimals: u32) -> Result<Self, UInt256Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err(UInt256Error::InvalidFormat("empty string".into()));
        }

        if value.starts_with('-') {
            return Err(UInt256Error::InvalidValue(format!(
                "negative amount not allowed: {}",
                value
            )));
        }

        let parts: Vec<&str> = value.split('.').collect();
        let (whole, frac) = match parts.len() {
            1 => (parts[0], ""),
            2 => {
                // Require both sides of the dot to be non-empty. This
                // rejects ambiguous forms like ".5" and "5.".
                if parts[0].is_empty() {
                    return Err(UInt256Error::InvalidFormat(
                        "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                    ));
                }
                if parts[1].is_empty() {
                    return Err(UInt256Error::InvalidFormat(
                        "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                    ));
                }
                (parts[0], parts[1])
            }
            _ => return Err(UInt256Error::InvalidFormat("multiple decimal points".into())),
        };

        let whole_num = parse_digits(whole)?;

        // The whole fractional part has to be digits, including anything
        // the truncation below drops; validating first also guarantees the
        // byte slice lands on character boundaries.
        if !frac.is_empty() {
            parse_digits(frac)?;
        }
        if decimals == 0 {
            return Ok(Self(whole_num));
        }

        // Truncate beyond `decimals` places, then right-pad to `decimals`.
        let width = decimals as usize;
        let kept = &frac[..frac.len().min(width)];
        let frac_padded = format!("{:0<width$}", kept, width = width);
        let frac_num = parse_digits(&frac_padded)?;

        let scale = BigUint::from(10u32).pow(decimals);
        Ok(Self(whole_num * scale + frac_num))
    }

    /// Render base units as a canonical decimal string.
    ///
    /// Inserts the decimal point `decimals` digits from the right and trims
    /// trailing fractional zeros, so `parse(x.format(d), d) == x` always
    /// holds.
    pub fn format(&self, decimals: u32) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }

        let scale = BigUint::from(10u32).pow(decimals);
        let (whole, frac) = self.0.div_rem(&scale);
        let frac_digits = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
        let frac_trimmed = frac_digits.trim_end_matches('0');

        if frac_trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, frac_trimmed)
        }
    }

    /// Add, returning a new amount. Never overflows.
    pub fn add(&self, other: &UInt256) -> UInt256 {
        Self(&self.0 + &other.0)
    }

    /// Subtract, returning a new amount.
    ///
    /// # Errors
    /// `InvalidValue` when `other > self` - the result would be negative.
    pub fn subtract(&self, other: &UInt256) -> Result<UInt256, UInt256Error> {
        if other.0 > self.0 {
            return Err(UInt256Error::InvalidValue(format!(
                "subtraction would produce a negative value: {} - {}",
                self.0, other.0
            )));
        }
        Ok(Self(&self.0 - &other.0))
    }

    /// Multiply, returning a new amount. Never overflows.
    pub fn multiply(&self, other: &UInt256) -> UInt256 {
        Self(&self.0 * &other.0)
    }

    /// Integer (truncating) division.
    ///
    /// # Errors
    /// `DivisionByZero` when `other` is zero.
    pub fn divide(&self, other: &UInt256) -> Result<UInt256, UInt256Error> {
        if other.is_zero() {
            return Err(UInt256Error::DivisionByZero);
        }
        Ok(Self(&self.0 / &other.0))
    }
}

/// Parse a run of ASCII digits into a BigUint, rejecting everything else.
fn parse_digits(digits: &str) -> Result<BigUint, UInt256Error> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UInt256Error::InvalidFormat(format!(
            "invalid decimal digits: {}",
            digits
        )));
    }
    BigUint::from_str(digits)
        .map_err(|e| UInt256Error::InvalidFormat(format!("invalid number {}: {}", digits, e)))
}

impl FromStr for UInt256 {
    type Err = UInt256Error;

    /// Construct from a plain base-unit integer string (no decimal point).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(UInt256Error::InvalidValue(format!(
                "negative amount not allowed: {}",
                s
            )));
        }
        Ok(Self(parse_digits(s)?))
    }
}

impl From<u32> for UInt256 {
    fn from(value: u32) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u64> for UInt256 {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for UInt256 {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Persisted amounts are decimal-integer strings, never JSON numbers:
// f64 round-tripping would silently corrupt anything above 2^53.
impl Serialize for UInt256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UInt256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UInt256::from_str(&raw).map_err(de::Error::custom)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
