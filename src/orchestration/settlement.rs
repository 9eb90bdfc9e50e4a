//! Batched settlement of selected locks and new investments.
//!
//! At most one ledger write is outstanding at a time. A settlement re-validates the
//! selection after every await and only then dispatches a single batch; success triggers
//! a full re-fetch followed by clearing both selection sets.

use super::workspace::Workspace;
use crate::datasource::{DataSourceError, ItemCatalog, LedgerSource, SettlementGateway};
use crate::domain::{
    Address, Amount, BoundsError, GroupKey, InvestmentOrder, ItemLimits, Ledger, Lock, LockId,
    SettlementAction, SettlementBatch, SettlementReceipt,
};
use crate::engine::SelectionCheckError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("nothing selected on the {0} ledger")]
    EmptySelection(Ledger),
    #[error("selection is stale, refresh and select again: {}", format_ids(.0))]
    StaleSelection(Vec<LockId>),
    #[error("lock duration {duration}s outside [{min}s, {max}s]")]
    DurationOutOfRange { duration: u64, min: u64, max: u64 },
    #[error("another settlement is still in progress")]
    SettlementInProgress,
    #[error("settlement failed: {0}")]
    SettlementFailed(String),
    #[error("{action} is not allowed on the {ledger} ledger: {reason}")]
    IllegalAction {
        action: SettlementAction,
        ledger: Ledger,
        reason: String,
    },
    #[error("reinvest requires a lock duration")]
    MissingDuration,
    #[error("selected amount {total} exceeds maximum investment {max}")]
    InvestmentCeilingExceeded { total: Amount, max: Amount },
    #[error("item metadata unavailable: {0}")]
    ItemMetadataUnavailable(String),
    #[error("no wallet connected")]
    NotConnected,
    #[error("invalid investment: {0}")]
    InvalidInvestment(String),
}

fn format_ids(ids: &[LockId]) -> String {
    ids.iter().map(LockId::to_string).collect::<Vec<_>>().join(", ")
}

impl From<SelectionCheckError> for SettlementError {
    fn from(err: SelectionCheckError) -> Self {
        match err {
            SelectionCheckError::Empty(ledger) => SettlementError::EmptySelection(ledger),
            SelectionCheckError::Stale(ids) => SettlementError::StaleSelection(ids),
        }
    }
}

impl From<BoundsError> for SettlementError {
    fn from(err: BoundsError) -> Self {
        match err {
            BoundsError::DurationOutOfRange { duration, min, max } => {
                SettlementError::DurationOutOfRange { duration, min, max }
            }
            other => SettlementError::InvalidInvestment(other.to_string()),
        }
    }
}

fn dispatch_failure(err: DataSourceError) -> SettlementError {
    match err {
        DataSourceError::Rejected(reason) => SettlementError::SettlementFailed(reason),
        other => SettlementError::SettlementFailed(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub batch: SettlementBatch,
    pub receipt: SettlementReceipt,
    /// False when the post-settlement re-fetch failed; the old snapshot is still shown.
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentResult {
    pub order: InvestmentOrder,
    pub receipt: SettlementReceipt,
    pub refreshed: bool,
}

/// Releases the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SettlementError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(flag))
            .map_err(|_| SettlementError::SettlementInProgress)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Checks that `action` may be applied to `locks` on `ledger`. Returns the target token
/// group for a reinvest.
pub fn check_legality(
    ledger: Ledger,
    action: SettlementAction,
    locks: &[Lock],
) -> Result<Option<GroupKey>, SettlementError> {
    let illegal = |reason: &str| SettlementError::IllegalAction {
        action,
        ledger,
        reason: reason.to_string(),
    };

    match action {
        SettlementAction::Unlock => {
            if ledger != Ledger::Fungible {
                return Err(illegal("only fungible locks can be unlocked"));
            }
            if locks.iter().any(|lock| lock.group().is_pending_queue()) {
                return Err(illegal("pending-queue locks are processed, not unlocked"));
            }
            Ok(None)
        }
        SettlementAction::ProcessPendingQueue => {
            if ledger != Ledger::Fungible {
                return Err(illegal("the pending queue only exists on the fungible ledger"));
            }
            if !locks.iter().all(|lock| lock.group().is_pending_queue()) {
                return Err(illegal("only pending-queue locks can be processed"));
            }
            Ok(None)
        }
        SettlementAction::WithdrawToWallet | SettlementAction::WithdrawToContract => {
            if ledger != Ledger::Native {
                return Err(illegal("only native locks can be withdrawn"));
            }
            Ok(None)
        }
        SettlementAction::Reinvest => {
            let Some(first) = locks.first().map(Lock::group) else {
                return Err(illegal("nothing to reinvest"));
            };
            if first.is_pending_queue() {
                return Err(illegal("pending-queue locks cannot be reinvested"));
            }
            if locks.iter().any(|lock| lock.group() != first) {
                return Err(illegal("reinvest targets a single token group"));
            }
            Ok(Some(first))
        }
    }
}

/// Apply the vault deposit to a requested investment and check it against the item bounds.
pub fn plan_investment(
    limits: &ItemLimits,
    duration: u64,
    amount: Amount,
    deposit: Option<Amount>,
) -> Result<InvestmentOrder, SettlementError> {
    limits.validate_duration(duration)?;
    let wallet_amount = match deposit {
        Some(deposit) => amount.saturating_sub(deposit),
        None => amount,
    };
    limits.validate_amount(wallet_amount)?;

    Ok(InvestmentOrder {
        token_id: limits.token_id,
        duration,
        amount: wallet_amount,
        use_deposit: deposit.is_some(),
    })
}

#[derive(Debug)]
pub struct SettlementOrchestrator {
    workspace: Arc<Workspace>,
    catalog: Arc<dyn ItemCatalog>,
    gateway: Arc<dyn SettlementGateway>,
    source: Arc<dyn LedgerSource>,
    in_flight: AtomicBool,
}

impl SettlementOrchestrator {
    pub fn new(
        workspace: Arc<Workspace>,
        catalog: Arc<dyn ItemCatalog>,
        gateway: Arc<dyn SettlementGateway>,
        source: Arc<dyn LedgerSource>,
    ) -> Self {
        Self {
            workspace,
            catalog,
            gateway,
            source,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn connected_account(&self) -> Result<Address, SettlementError> {
        self.workspace.account().ok_or(SettlementError::NotConnected)
    }

    async fn item_limits(&self, group: GroupKey) -> Result<ItemLimits, SettlementError> {
        let token_id = group
            .token_id()
            .ok_or_else(|| SettlementError::ItemMetadataUnavailable(format!("group {}", group)))?;
        self.catalog
            .item_limits(token_id.get())
            .await
            .map_err(|e| SettlementError::ItemMetadataUnavailable(e.to_string()))
    }

    fn validated(&self, ledger: Ledger) -> Result<Vec<Lock>, SettlementError> {
        Ok(self
            .workspace
            .with_engine(|engine| engine.validated_selection(ledger))?)
    }

    pub async fn execute(
        &self,
        ledger: Ledger,
        action: SettlementAction,
        duration: Option<u64>,
    ) -> Result<SettlementResult, SettlementError> {
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        let account = self.connected_account()?;

        let locks = self.validated(ledger)?;
        let reinvest_group = check_legality(ledger, action, &locks)?;

        let duration = match reinvest_group {
            Some(group) => {
                let duration = duration.ok_or(SettlementError::MissingDuration)?;
                let limits = self.item_limits(group).await?;
                limits.validate_duration(duration)?;
                if ledger == Ledger::Native {
                    let (total, over) = self.workspace.with_engine(|engine| {
                        (
                            engine.total_selected_native_amount(),
                            engine.exceeds_investment_ceiling(&limits),
                        )
                    });
                    if over {
                        return Err(SettlementError::InvestmentCeilingExceeded {
                            total,
                            max: limits.max_investment,
                        });
                    }
                }
                Some(duration)
            }
            None => None,
        };

        // The selection or snapshot may have moved while metadata was loading.
        let current = self.validated(ledger)?;
        if current != locks {
            let ids = locks
                .iter()
                .filter(|lock| !current.contains(lock))
                .chain(current.iter().filter(|lock| !locks.contains(lock)))
                .map(|lock| lock.id)
                .collect();
            return Err(SettlementError::StaleSelection(dedup_ids(ids)));
        }

        let mut indices: Vec<u32> = locks.iter().map(Lock::index).collect();
        indices.sort_unstable();
        let batch = SettlementBatch {
            ledger,
            action,
            indices,
            duration,
        };

        info!(
            %ledger,
            %action,
            indices = ?batch.indices,
            duration = ?batch.duration,
            "dispatching settlement"
        );
        let receipt = self
            .gateway
            .submit(&account, &batch)
            .await
            .map_err(|e| {
                warn!(%ledger, %action, error = %e, "settlement rejected");
                dispatch_failure(e)
            })?;
        info!(%ledger, %action, tx_hash = %receipt.tx_hash, "settlement confirmed");

        let refreshed = self.refresh_after_write().await;
        self.workspace.with_engine(|engine| engine.clear());

        Ok(SettlementResult {
            batch,
            receipt,
            refreshed,
        })
    }

    /// Lock a new native amount against a token group. Selections are not touched.
    pub async fn invest(
        &self,
        token_id: u64,
        duration: u64,
        amount: Amount,
        use_deposit: bool,
    ) -> Result<InvestmentResult, SettlementError> {
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        let account = self.connected_account()?;

        if token_id == 0 {
            return Err(SettlementError::InvalidInvestment(
                "investments target a token group".to_string(),
            ));
        }
        let limits = self.item_limits(GroupKey::from_raw(token_id)).await?;

        let deposit = if use_deposit {
            let balance = self
                .source
                .fetch_vault_balance(&account)
                .await
                .map_err(|e| {
                    SettlementError::ItemMetadataUnavailable(format!("vault balance: {}", e))
                })?;
            Some(balance)
        } else {
            None
        };

        let order = plan_investment(&limits, duration, amount, deposit)?;
        info!(
            token_id,
            duration,
            amount = %order.amount,
            use_deposit,
            "dispatching investment"
        );
        let receipt = self
            .gateway
            .invest(&account, &order)
            .await
            .map_err(|e| {
                warn!(token_id, error = %e, "investment rejected");
                dispatch_failure(e)
            })?;

        let refreshed = self.refresh_after_write().await;
        Ok(InvestmentResult {
            order,
            receipt,
            refreshed,
        })
    }

    async fn refresh_after_write(&self) -> bool {
        match self.workspace.refresh().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "refresh after settlement failed");
                false
            }
        }
    }
}

fn dedup_ids(mut ids: Vec<LockId>) -> Vec<LockId> {
    ids.sort();
    ids.dedup();
    ids
}
