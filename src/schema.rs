use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Account address being monitored.
///
/// A plain 20-byte value. It is supplied once through configuration and
/// is never mutated by the collector.
///
/// CANONICAL FORM:
/// - Lowercase hex with a `0x` prefix, 42 characters in total.
/// - This is the form used for sink tags and log fields.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("address must have 40 hex digits, got {0}")]
    BadLength(usize),

    #[error("address is not valid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != 40 {
            return Err(AddressError::BadLength(digits.len()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ------------------------------------------------------------
// Wallet row
// ------------------------------------------------------------
//
// One collection result for one address in one cycle.
//
// A row is only built once all three sub-queries succeeded,
// so every field is always populated. Rows are handed to the
// sink and then dropped; nothing keeps history.
//
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletRow {
    pub addr: Address,

    /// Token balance in whole tokens (raw amount / 10^18)
    pub balance: f64,

    /// Number of accepted deals the address takes part in
    pub deals: u64,

    /// Number of active orders authored by the address
    pub orders: u64,
}

/// The three backend calls that make up a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubQuery {
    Balance,
    Deals,
    Orders,
}

impl SubQuery {
    pub fn name(self) -> &'static str {
        match self {
            SubQuery::Balance => "balance",
            SubQuery::Deals => "deals",
            SubQuery::Orders => "orders",
        }
    }
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
