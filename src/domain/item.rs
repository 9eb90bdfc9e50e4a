//! Item investment bounds and fee configuration.
//!
//! `ItemLimits` owns every duration/amount bounds check; selection, settlement and
//! investment planning all go through these methods.

use super::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Basis-point denominator used by the remote ledger.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Investment bounds of the item behind a token group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLimits {
    pub token_id: u64,
    pub min_investment: Amount,
    pub max_investment: Amount,
    /// Seconds.
    pub min_lock_duration: u64,
    /// Seconds.
    pub max_lock_duration: u64,
    /// Annual rate in basis points.
    pub apr_bps: u32,
    pub strategy_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("lock duration {duration}s outside [{min}s, {max}s]")]
    DurationOutOfRange { duration: u64, min: u64, max: u64 },
    #[error("amount {amount} below minimum investment {min}")]
    AmountBelowMinimum { amount: Amount, min: Amount },
    #[error("amount {amount} above maximum investment {max}")]
    AmountAboveMaximum { amount: Amount, max: Amount },
}

impl ItemLimits {
    pub fn validate_duration(&self, duration: u64) -> Result<(), BoundsError> {
        if duration < self.min_lock_duration || duration > self.max_lock_duration {
            return Err(BoundsError::DurationOutOfRange {
                duration,
                min: self.min_lock_duration,
                max: self.max_lock_duration,
            });
        }
        Ok(())
    }

    pub fn validate_amount(&self, amount: Amount) -> Result<(), BoundsError> {
        if amount < self.min_investment {
            return Err(BoundsError::AmountBelowMinimum {
                amount,
                min: self.min_investment,
            });
        }
        if self.exceeds_ceiling(amount) {
            return Err(BoundsError::AmountAboveMaximum {
                amount,
                max: self.max_investment,
            });
        }
        Ok(())
    }

    pub fn exceeds_ceiling(&self, amount: Amount) -> bool {
        amount > self.max_investment
    }
}

/// Fee rates in basis points, read once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSettings {
    pub nft_purchase_fee: u32,
    pub zkn_buy_fee: u32,
    pub zkn_sell_fee: u32,
    pub game_fee: u32,
    pub performance_fee: u32,
}

/// Parameters of one expected-profit query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub amount: Amount,
    /// Seconds.
    pub duration: u64,
    pub apr_bps: u32,
    pub strategy_id: u32,
}

impl EstimateRequest {
    pub fn for_item(limits: &ItemLimits, amount: Amount, duration: u64) -> Self {
        Self {
            amount,
            duration,
            apr_bps: limits.apr_bps,
            strategy_id: limits.strategy_id,
        }
    }

    /// A zero amount or zero duration yields nothing and needs no oracle call.
    pub fn is_trivially_zero(&self) -> bool {
        self.amount.is_zero() || self.duration == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ItemLimits {
        ItemLimits {
            token_id: 7,
            min_investment: Amount::new(100),
            max_investment: Amount::new(1_000),
            min_lock_duration: 86_400,
            max_lock_duration: 30 * 86_400,
            apr_bps: 1_200,
            strategy_id: 1,
        }
    }

    #[test]
    fn test_duration_bounds_are_inclusive() {
        let l = limits();
        assert!(l.validate_duration(86_400).is_ok());
        assert!(l.validate_duration(30 * 86_400).is_ok());
        assert_eq!(
            l.validate_duration(86_399),
            Err(BoundsError::DurationOutOfRange {
                duration: 86_399,
                min: 86_400,
                max: 30 * 86_400
            })
        );
        assert!(l.validate_duration(30 * 86_400 + 1).is_err());
    }

    #[test]
    fn test_amount_bounds() {
        let l = limits();
        assert!(l.validate_amount(Amount::new(100)).is_ok());
        assert!(l.validate_amount(Amount::new(1_000)).is_ok());
        assert!(matches!(
            l.validate_amount(Amount::new(99)),
            Err(BoundsError::AmountBelowMinimum { .. })
        ));
        assert!(matches!(
            l.validate_amount(Amount::new(1_001)),
            Err(BoundsError::AmountAboveMaximum { .. })
        ));
        assert!(!l.exceeds_ceiling(Amount::new(1_000)));
        assert!(l.exceeds_ceiling(Amount::new(1_001)));
    }
}
