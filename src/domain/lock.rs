//! Lock records and their snapshot-scoped identifiers.

use super::{Amount, GroupKey, Ledger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a lock within one aggregation snapshot.
///
/// Rendered as `{ledger}-{groupKey}-{sequenceIndex}`. The index is the position of the
/// lock in the sequence returned by the remote ledger, so an identifier is only
/// meaningful against the snapshot that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockId {
    pub ledger: Ledger,
    pub group: GroupKey,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lock id {input:?}: {reason}")]
pub struct LockIdParseError {
    pub input: String,
    pub reason: String,
}

impl LockId {
    pub fn new(ledger: Ledger, group: GroupKey, index: u32) -> Self {
        Self {
            ledger,
            group,
            index,
        }
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.ledger, self.group, self.index)
    }
}

impl FromStr for LockId {
    type Err = LockIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| LockIdParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split('-');
        let (Some(ledger), Some(group), Some(index), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(err("expected three dash-separated segments"));
        };

        let ledger = ledger.parse::<Ledger>().map_err(|e| err(&e))?;
        let group = group
            .parse::<u64>()
            .map(GroupKey::from_raw)
            .map_err(|_| err("group key must be a non-negative integer"))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| err("sequence index must be a non-negative integer"))?;

        if ledger == Ledger::Native && group.is_pending_queue() {
            return Err(err("native locks always belong to a token group"));
        }

        Ok(LockId::new(ledger, group, index))
    }
}

impl TryFrom<String> for LockId {
    type Error = LockIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LockId> for String {
    fn from(id: LockId) -> Self {
        id.to_string()
    }
}

/// Raw lock record as returned by the remote ledger, before an index is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub token_id: u64,
    pub amount: Amount,
    pub lock_end: u64,
    #[serde(default)]
    pub claimed: bool,
}

/// A time-locked position on one of the two ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub id: LockId,
    pub amount: Amount,
    /// Maturity timestamp in epoch seconds (0 = no maturity recorded).
    pub lock_end: u64,
    pub claimed: bool,
}

impl Lock {
    pub fn from_record(ledger: Ledger, index: u32, record: &LockRecord) -> Self {
        Self {
            id: LockId::new(ledger, GroupKey::from_raw(record.token_id), index),
            amount: record.amount,
            lock_end: record.lock_end,
            claimed: record.claimed,
        }
    }

    pub fn ledger(&self) -> Ledger {
        self.id.ledger
    }

    pub fn group(&self) -> GroupKey {
        self.id.group
    }

    /// External sequence index on the remote ledger.
    pub fn index(&self) -> u32 {
        self.id.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_id_display() {
        let id = LockId::new(Ledger::Native, GroupKey::from_raw(7), 3);
        assert_eq!(id.to_string(), "native-7-3");
        let id = LockId::new(Ledger::Fungible, GroupKey::PendingQueue, 0);
        assert_eq!(id.to_string(), "fungible-0-0");
    }

    #[test]
    fn test_lock_id_parse() {
        let id: LockId = "fungible-12-4".parse().unwrap();
        assert_eq!(id.ledger, Ledger::Fungible);
        assert_eq!(id.group, GroupKey::from_raw(12));
        assert_eq!(id.index, 4);
    }

    #[test]
    fn test_lock_id_parse_rejects_malformed() {
        for input in [
            "",
            "native-7",
            "native-7-3-1",
            "eth-7-3",
            "native-x-3",
            "native-7--1",
            "native-0-1",
        ] {
            assert!(input.parse::<LockId>().is_err(), "{} should not parse", input);
        }
    }

    #[test]
    fn test_lock_from_record_assigns_index_and_group() {
        let record = LockRecord {
            token_id: 0,
            amount: Amount::new(10),
            lock_end: 100,
            claimed: false,
        };
        let lock = Lock::from_record(Ledger::Fungible, 5, &record);
        assert_eq!(lock.group(), GroupKey::PendingQueue);
        assert_eq!(lock.index(), 5);
        assert_eq!(lock.id.to_string(), "fungible-0-5");
    }

    #[test]
    fn test_lock_record_deserializes_wire_shape() {
        let json = serde_json::json!({
            "tokenId": 7,
            "amount": "1000",
            "lockEnd": 1700000000
        });
        let record: LockRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.token_id, 7);
        assert_eq!(record.amount, Amount::new(1000));
        assert!(!record.claimed);
    }
}
