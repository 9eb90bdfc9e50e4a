//! Domain types for the lock desk.
//!
//! This module provides:
//! - Exact 128-bit amounts with ether-string conversion
//! - Domain primitives: Address, Ledger, GroupKey
//! - Lock records and snapshot-scoped lock identifiers
//! - Item investment bounds and fee settings
//! - Settlement actions and batched ledger calls

pub mod amount;
pub mod item;
pub mod lock;
pub mod primitives;
pub mod settlement;

pub use amount::{Amount, AmountParseError};
pub use item::{BoundsError, EstimateRequest, FeeSettings, ItemLimits, BPS_DENOMINATOR};
pub use lock::{Lock, LockId, LockIdParseError, LockRecord};
pub use primitives::{now_secs, Address, AddressParseError, GroupKey, Ledger};
pub use settlement::{InvestmentOrder, SettlementAction, SettlementBatch, SettlementReceipt};
