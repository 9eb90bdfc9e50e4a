//! In-memory ledger for testing without network calls.

use super::{DataSourceError, ItemCatalog, LedgerSource, ProfitOracle, SettlementGateway};
use crate::domain::{
    Address, Amount, EstimateRequest, FeeSettings, InvestmentOrder, ItemLimits, Ledger,
    LockRecord, SettlementBatch, SettlementReceipt,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;

#[derive(Debug, Default)]
struct MockState {
    fungible: Vec<LockRecord>,
    native: Vec<LockRecord>,
    fees: Option<FeeSettings>,
    vault_balance: Amount,
    items: HashMap<u64, ItemLimits>,
    locks_unavailable: bool,
    oracle_unavailable: bool,
    oracle_delays: VecDeque<Duration>,
    native_read_delays: VecDeque<Duration>,
    submit_delay: Option<Duration>,
    rejection: Option<String>,
    submitted: Vec<SettlementBatch>,
    investments: Vec<InvestmentOrder>,
}

/// Mock ledger that serves predefined locks and records every dispatched call.
///
/// Expected profit is `amount * apr_bps * duration / (10_000 * seconds_per_year)`.
/// A successful settlement marks the targeted records as claimed.
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
    oracle_calls: AtomicUsize,
    fee_calls: AtomicUsize,
}

impl MockLedger {
    /// Create a new mock ledger with no locks.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    fn update(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn read<T>(&self, f: impl FnOnce(&MockState) -> T) -> T {
        match self.state.lock() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    /// Add a fungible-ledger lock.
    pub fn with_fungible(self, token_id: u64, amount: u128, lock_end: u64) -> Self {
        self.with_state(|s| s.fungible.push(record(token_id, amount, lock_end)))
    }

    /// Add a native-ledger lock.
    pub fn with_native(self, token_id: u64, amount: u128, lock_end: u64) -> Self {
        self.with_state(|s| s.native.push(record(token_id, amount, lock_end)))
    }

    /// Add a lock record as-is (e.g. an already claimed one).
    pub fn with_record(self, ledger: Ledger, record: LockRecord) -> Self {
        self.with_state(|s| match ledger {
            Ledger::Fungible => s.fungible.push(record),
            Ledger::Native => s.native.push(record),
        })
    }

    /// Set the fee settings returned by fetch_fee_settings.
    pub fn with_fees(self, fees: FeeSettings) -> Self {
        self.with_state(|s| s.fees = Some(fees))
    }

    /// Register item limits for a token group.
    pub fn with_item(self, limits: ItemLimits) -> Self {
        self.with_state(|s| {
            s.items.insert(limits.token_id, limits);
        })
    }

    /// Set the vault deposit balance.
    pub fn with_vault_balance(self, balance: u128) -> Self {
        self.with_state(|s| s.vault_balance = Amount::new(balance))
    }

    /// Replace the native-ledger sequence.
    pub fn set_native(&self, records: Vec<LockRecord>) {
        self.update(|s| s.native = records);
    }

    /// Replace the fungible-ledger sequence.
    pub fn set_fungible(&self, records: Vec<LockRecord>) {
        self.update(|s| s.fungible = records);
    }

    /// Make lock reads fail with a network error.
    pub fn set_locks_unavailable(&self, unavailable: bool) {
        self.update(|s| s.locks_unavailable = unavailable);
    }

    /// Make profit queries fail.
    pub fn set_oracle_unavailable(&self, unavailable: bool) {
        self.update(|s| s.oracle_unavailable = unavailable);
    }

    /// Delay the next profit queries, one entry per call.
    pub fn push_oracle_delay(&self, delay: Duration) {
        self.update(|s| s.oracle_delays.push_back(delay));
    }

    /// Delay the next native lock reads, one entry per call. The records are captured
    /// before the delay, like a slow response carrying older data.
    pub fn push_native_read_delay(&self, delay: Duration) {
        self.update(|s| s.native_read_delays.push_back(delay));
    }

    /// Delay every settlement dispatch.
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        self.update(|s| s.submit_delay = delay);
    }

    /// Make settlement calls fail with the given revert reason.
    pub fn set_rejection(&self, reason: Option<&str>) {
        self.update(|s| s.rejection = reason.map(str::to_string));
    }

    pub fn submitted(&self) -> Vec<SettlementBatch> {
        self.read(|s| s.submitted.clone())
    }

    pub fn investments(&self) -> Vec<InvestmentOrder> {
        self.read(|s| s.investments.clone())
    }

    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls.load(Ordering::SeqCst)
    }

    pub fn fee_calls(&self) -> usize {
        self.fee_calls.load(Ordering::SeqCst)
    }
}

fn record(token_id: u64, amount: u128, lock_end: u64) -> LockRecord {
    LockRecord {
        token_id,
        amount: Amount::new(amount),
        lock_end,
        claimed: false,
    }
}

fn tx_hash(n: usize) -> String {
    format!("0x{:064x}", n)
}

#[async_trait]
impl LedgerSource for MockLedger {
    async fn fetch_fungible_locks(
        &self,
        _account: &Address,
    ) -> Result<Vec<LockRecord>, DataSourceError> {
        self.read(|s| {
            if s.locks_unavailable {
                return Err(DataSourceError::NetworkError("mock ledger offline".into()));
            }
            Ok(s.fungible.clone())
        })
    }

    async fn fetch_native_locks(
        &self,
        _account: &Address,
    ) -> Result<Vec<LockRecord>, DataSourceError> {
        let mut delay = None;
        self.update(|s| delay = s.native_read_delays.pop_front());
        let records = self.read(|s| {
            if s.locks_unavailable {
                return Err(DataSourceError::NetworkError("mock ledger offline".into()));
            }
            Ok(s.native.clone())
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        records
    }

    async fn fetch_fee_settings(&self) -> Result<FeeSettings, DataSourceError> {
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        self.read(|s| {
            s.fees
                .ok_or_else(|| DataSourceError::Other("fee settings not configured".into()))
        })
    }

    async fn fetch_vault_balance(&self, _account: &Address) -> Result<Amount, DataSourceError> {
        Ok(self.read(|s| s.vault_balance))
    }
}

#[async_trait]
impl ProfitOracle for MockLedger {
    async fn expected_profit(&self, request: &EstimateRequest) -> Result<Amount, DataSourceError> {
        self.oracle_calls.fetch_add(1, Ordering::SeqCst);
        let mut delay = None;
        self.update(|s| delay = s.oracle_delays.pop_front());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.read(|s| s.oracle_unavailable) {
            return Err(DataSourceError::NetworkError("oracle offline".into()));
        }

        let profit = request.amount.get()
            * u128::from(request.apr_bps)
            * u128::from(request.duration)
            / (10_000 * SECONDS_PER_YEAR);
        Ok(Amount::new(profit))
    }
}

#[async_trait]
impl ItemCatalog for MockLedger {
    async fn item_limits(&self, token_id: u64) -> Result<ItemLimits, DataSourceError> {
        self.read(|s| {
            s.items.get(&token_id).cloned().ok_or_else(|| DataSourceError::HttpError {
                status: 404,
                message: format!("unknown token {}", token_id),
            })
        })
    }
}

#[async_trait]
impl SettlementGateway for MockLedger {
    async fn submit(
        &self,
        _account: &Address,
        batch: &SettlementBatch,
    ) -> Result<SettlementReceipt, DataSourceError> {
        if let Some(delay) = self.read(|s| s.submit_delay) {
            tokio::time::sleep(delay).await;
        }

        let mut outcome = Err(DataSourceError::Other("mock state poisoned".into()));
        self.update(|s| {
            if let Some(reason) = &s.rejection {
                outcome = Err(DataSourceError::Rejected(reason.clone()));
                return;
            }
            let records = match batch.ledger {
                Ledger::Fungible => &mut s.fungible,
                Ledger::Native => &mut s.native,
            };
            for index in &batch.indices {
                if let Some(record) = records.get_mut(*index as usize) {
                    record.claimed = true;
                }
            }
            s.submitted.push(batch.clone());
            outcome = Ok(SettlementReceipt {
                tx_hash: tx_hash(s.submitted.len() + s.investments.len()),
            });
        });
        outcome
    }

    async fn invest(
        &self,
        _account: &Address,
        order: &InvestmentOrder,
    ) -> Result<SettlementReceipt, DataSourceError> {
        let mut outcome = Err(DataSourceError::Other("mock state poisoned".into()));
        self.update(|s| {
            if let Some(reason) = &s.rejection {
                outcome = Err(DataSourceError::Rejected(reason.clone()));
                return;
            }
            s.native.push(LockRecord {
                token_id: order.token_id,
                amount: order.amount,
                lock_end: 0,
                claimed: false,
            });
            s.investments.push(order.clone());
            outcome = Ok(SettlementReceipt {
                tx_hash: tx_hash(s.submitted.len() + s.investments.len()),
            });
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SettlementAction;

    fn account() -> Address {
        "0x1111111111111111111111111111111111111111".parse().unwrap()
    }

    #[tokio::test]
    async fn test_mock_ledger_serves_locks_in_order() {
        let mock = MockLedger::new()
            .with_fungible(7, 100, 10)
            .with_fungible(0, 50, 20)
            .with_native(7, 300, 30);

        let fungible = mock.fetch_fungible_locks(&account()).await.unwrap();
        assert_eq!(fungible.len(), 2);
        assert_eq!(fungible[1].token_id, 0);

        let native = mock.fetch_native_locks(&account()).await.unwrap();
        assert_eq!(native[0].amount, Amount::new(300));
    }

    #[tokio::test]
    async fn test_mock_ledger_offline() {
        let mock = MockLedger::new();
        mock.set_locks_unavailable(true);
        assert!(mock.fetch_native_locks(&account()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_submit_marks_claimed_and_records() {
        let mock = MockLedger::new().with_native(7, 100, 10).with_native(7, 200, 10);
        let batch = SettlementBatch {
            ledger: Ledger::Native,
            action: SettlementAction::WithdrawToWallet,
            indices: vec![1],
            duration: None,
        };
        mock.submit(&account(), &batch).await.unwrap();

        let native = mock.fetch_native_locks(&account()).await.unwrap();
        assert!(!native[0].claimed);
        assert!(native[1].claimed);
        assert_eq!(mock.submitted(), vec![batch]);
    }

    #[tokio::test]
    async fn test_mock_rejection() {
        let mock = MockLedger::new().with_native(7, 100, 10);
        mock.set_rejection(Some("execution reverted"));
        let batch = SettlementBatch {
            ledger: Ledger::Native,
            action: SettlementAction::WithdrawToWallet,
            indices: vec![0],
            duration: None,
        };
        let err = mock.submit(&account(), &batch).await.unwrap_err();
        assert!(matches!(err, DataSourceError::Rejected(_)));
        assert!(mock.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_mock_profit_formula() {
        let mock = MockLedger::new();
        let request = EstimateRequest {
            amount: Amount::new(1_000_000),
            duration: SECONDS_PER_YEAR as u64,
            apr_bps: 1_000,
            strategy_id: 1,
        };
        let profit = mock.expected_profit(&request).await.unwrap();
        assert_eq!(profit, Amount::new(100_000));
        assert_eq!(mock.oracle_calls(), 1);
    }
}
