//! Projected yield for a proposed lock, net of the performance fee.
//!
//! Recomputations are last-write-wins: every call takes a fresh token and only the
//! holder of the newest token may commit its result.

use crate::datasource::{DataSourceError, LedgerSource, ProfitOracle};
use crate::domain::{Amount, EstimateRequest, FeeSettings, BPS_DENOMINATOR};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Result of an expected-profit query. `Unknown` is not zero: the oracle could not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Estimate {
    Known(Amount),
    Unknown,
}

impl Estimate {
    pub fn known(&self) -> Option<Amount> {
        match self {
            Estimate::Known(amount) => Some(*amount),
            Estimate::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateOutcome {
    Committed(Estimate),
    /// A newer recomputation started before this one finished; the result was dropped.
    Superseded,
}

/// What the UI shows for the current proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateState {
    pub request: Option<EstimateRequest>,
    pub estimate: Option<Estimate>,
    pub loading: bool,
    pub error: Option<String>,
}

/// `gross - floor(gross * bps / 10_000)` without widening: the product is split on the
/// denominator so no `u128` gross can overflow.
pub fn apply_performance_fee(gross: Amount, fees: &FeeSettings) -> Amount {
    let bps = u128::from(fees.performance_fee).min(BPS_DENOMINATOR);
    let g = gross.get();
    let fee = (g / BPS_DENOMINATOR) * bps + ((g % BPS_DENOMINATOR) * bps) / BPS_DENOMINATOR;
    gross.saturating_sub(Amount::new(fee))
}

#[derive(Debug)]
pub struct YieldEstimator {
    oracle: Arc<dyn ProfitOracle>,
    source: Arc<dyn LedgerSource>,
    fees: OnceCell<FeeSettings>,
    latest: AtomicU64,
    state: Mutex<EstimateState>,
}

impl YieldEstimator {
    pub fn new(oracle: Arc<dyn ProfitOracle>, source: Arc<dyn LedgerSource>) -> Self {
        Self {
            oracle,
            source,
            fees: OnceCell::new(),
            latest: AtomicU64::new(0),
            state: Mutex::new(EstimateState::default()),
        }
    }

    /// Gross expected profit. Failures surface as `Estimate::Unknown`.
    pub async fn estimate(&self, request: &EstimateRequest) -> Estimate {
        match self.gross(request).await {
            Ok(amount) => Estimate::Known(amount),
            Err(e) => {
                warn!(error = %e, "expected profit unavailable");
                Estimate::Unknown
            }
        }
    }

    async fn gross(&self, request: &EstimateRequest) -> Result<Amount, DataSourceError> {
        if request.is_trivially_zero() {
            return Ok(Amount::ZERO);
        }
        self.oracle.expected_profit(request).await
    }

    /// Fee settings of the session. Only a successful fetch is cached.
    pub async fn fee_settings(&self) -> Result<FeeSettings, DataSourceError> {
        self.fees
            .get_or_try_init(|| self.source.fetch_fee_settings())
            .await
            .copied()
    }

    async fn net(&self, request: &EstimateRequest) -> Result<Amount, DataSourceError> {
        let gross = self.gross(request).await?;
        if gross.is_zero() {
            return Ok(gross);
        }
        match self.fee_settings().await {
            Ok(fees) => Ok(apply_performance_fee(gross, &fees)),
            Err(e) => {
                warn!(error = %e, "fee settings unavailable, reporting gross yield");
                Ok(gross)
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut EstimateState)) {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn next_token(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn recompute(&self, request: EstimateRequest) -> EstimateOutcome {
        let token = self.next_token();
        self.update(|s| {
            s.request = Some(request);
            s.loading = true;
        });

        let result = self.net(&request).await;

        let (estimate, error) = match result {
            Ok(amount) => (Estimate::Known(amount), None),
            Err(e) => {
                warn!(error = %e, token, "expected profit unavailable");
                (Estimate::Unknown, Some(e.to_string()))
            }
        };

        let mut committed = false;
        self.update(|s| {
            if self.latest.load(Ordering::SeqCst) != token {
                return;
            }
            s.estimate = Some(estimate);
            s.error = error;
            s.loading = false;
            committed = true;
        });

        if committed {
            EstimateOutcome::Committed(estimate)
        } else {
            debug!(token, "estimate superseded");
            EstimateOutcome::Superseded
        }
    }

    /// Record that no estimate can be produced for the current proposal. Any recompute
    /// still in flight is superseded.
    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let token = self.next_token();
        debug!(token, %reason, "estimate marked unavailable");
        self.update(|s| {
            s.request = None;
            s.estimate = Some(Estimate::Unknown);
            s.error = Some(reason);
            s.loading = false;
        });
    }

    pub fn current(&self) -> EstimateState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockLedger;

    fn fees(performance_fee: u32) -> FeeSettings {
        FeeSettings {
            performance_fee,
            ..FeeSettings::default()
        }
    }

    #[test]
    fn test_apply_performance_fee_floors() {
        assert_eq!(
            apply_performance_fee(Amount::new(1_000_000), &fees(250)),
            Amount::new(975_000)
        );
        // fee = floor(9_999 * 1 / 10_000) = 0
        assert_eq!(apply_performance_fee(Amount::new(9_999), &fees(1)), Amount::new(9_999));
        assert_eq!(apply_performance_fee(Amount::new(10_001), &fees(1)), Amount::new(10_000));
        assert_eq!(apply_performance_fee(Amount::new(500), &fees(0)), Amount::new(500));
        assert_eq!(apply_performance_fee(Amount::new(500), &fees(10_000)), Amount::ZERO);
    }

    #[test]
    fn test_apply_performance_fee_no_overflow_at_max() {
        let net = apply_performance_fee(Amount::new(u128::MAX), &fees(10_000));
        assert_eq!(net, Amount::ZERO);
        let net = apply_performance_fee(Amount::new(u128::MAX), &fees(5_000));
        assert!(net.get() > 0 && net.get() < u128::MAX);
    }

    #[tokio::test]
    async fn test_fee_settings_cached_after_first_success() {
        let ledger = Arc::new(MockLedger::new().with_fees(fees(250)));
        let estimator = YieldEstimator::new(ledger.clone(), ledger.clone());

        estimator.fee_settings().await.unwrap();
        estimator.fee_settings().await.unwrap();
        assert_eq!(ledger.fee_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_fees_are_not_cached() {
        let ledger = Arc::new(MockLedger::new());
        let estimator = YieldEstimator::new(ledger.clone(), ledger.clone());

        assert!(estimator.fee_settings().await.is_err());
        assert!(estimator.fee_settings().await.is_err());
        assert_eq!(ledger.fee_calls(), 2);
    }

    #[tokio::test]
    async fn test_mark_unavailable_reports_unknown() {
        let ledger = Arc::new(MockLedger::new());
        let estimator = YieldEstimator::new(ledger.clone(), ledger);

        estimator.mark_unavailable("selection above investment ceiling");
        let state = estimator.current();
        assert_eq!(state.estimate, Some(Estimate::Unknown));
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("selection above investment ceiling"));
    }

    #[test]
    fn test_estimate_serializes_tagged() {
        let json = serde_json::to_value(Estimate::Known(Amount::new(5))).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "known", "value": "5" }));
        let json = serde_json::to_value(Estimate::Unknown).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "unknown" }));
    }
}
