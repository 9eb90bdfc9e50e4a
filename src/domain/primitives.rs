//! Domain primitives: Address, Ledger, GroupKey.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use thiserror::Error;

/// Current wall-clock time in epoch seconds.
pub fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Account address: `0x` followed by 20 hex-encoded bytes, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address is not valid hex: {0}")]
    InvalidHex(String),
    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl Address {
    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        let bytes = hex::decode(body).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressParseError::InvalidLength(bytes.len()));
        }
        Ok(Address(format!("0x{}", hex::encode(bytes))))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two parallel lock ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ledger {
    /// Fungible-token lock ledger.
    Fungible,
    /// Native-asset lock ledger.
    Native,
}

impl Ledger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ledger::Fungible => "fungible",
            Ledger::Native => "native",
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ledger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fungible" => Ok(Ledger::Fungible),
            "native" => Ok(Ledger::Native),
            other => Err(format!("unknown ledger: {}", other)),
        }
    }
}

/// External grouping key of a lock.
///
/// The remote ledger uses token id 0 on the fungible ledger for locks that are
/// waiting in the withdrawal queue and belong to no token group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum GroupKey {
    PendingQueue,
    Token(NonZeroU64),
}

impl GroupKey {
    pub fn from_raw(raw: u64) -> Self {
        match NonZeroU64::new(raw) {
            Some(id) => GroupKey::Token(id),
            None => GroupKey::PendingQueue,
        }
    }

    /// Raw external token id (0 for the pending queue).
    pub fn raw(&self) -> u64 {
        match self {
            GroupKey::PendingQueue => 0,
            GroupKey::Token(id) => id.get(),
        }
    }

    pub fn is_pending_queue(&self) -> bool {
        matches!(self, GroupKey::PendingQueue)
    }

    pub fn token_id(&self) -> Option<NonZeroU64> {
        match self {
            GroupKey::PendingQueue => None,
            GroupKey::Token(id) => Some(*id),
        }
    }
}

impl From<u64> for GroupKey {
    fn from(raw: u64) -> Self {
        GroupKey::from_raw(raw)
    }
}

impl From<GroupKey> for u64 {
    fn from(key: GroupKey) -> Self {
        key.raw()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}
