use super::repository::{LockRepository, RepositoryError};
use super::settlement::{
    InvestmentResult, SettlementError, SettlementOrchestrator, SettlementResult,
};
use super::workspace::Workspace;
use crate::datasource::{
    ItemCatalog, LedgerSource, ProfitOracle, SessionProvider, SettlementGateway,
};
use crate::domain::{
    now_secs, Amount, EstimateRequest, GroupKey, ItemLimits, Ledger, Lock, LockId,
    SettlementAction,
};
use crate::engine::{
    has_matured, is_settleable, max_row_count, EstimateOutcome, EstimateState, NativeToggle,
    SelectionEngine, SelectionError, Snapshot, Toggle, YieldEstimator,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Effect of one toggle on the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum SelectionChange {
    Added,
    Removed,
    Replaced { discarded: usize },
}

impl From<Toggle> for SelectionChange {
    fn from(toggle: Toggle) -> Self {
        match toggle {
            Toggle::Added => SelectionChange::Added,
            Toggle::Removed => SelectionChange::Removed,
        }
    }
}

impl From<NativeToggle> for SelectionChange {
    fn from(toggle: NativeToggle) -> Self {
        match toggle {
            NativeToggle::Added => SelectionChange::Added,
            NativeToggle::Removed => SelectionChange::Removed,
            NativeToggle::Replaced { discarded } => SelectionChange::Replaced { discarded },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    pub id: LockId,
    pub amount: Amount,
    pub lock_end: u64,
    pub claimed: bool,
    pub matured: bool,
    pub selected: bool,
    /// Whether the lock may be toggled on right now.
    pub selectable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub key: GroupKey,
    pub rows: usize,
    pub outstanding_native_amount: Amount,
    pub fungible: Vec<LockView>,
    pub native: Vec<LockView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocksView {
    pub generation: u64,
    pub fetched_at: u64,
    pub connected: bool,
    pub available_fungible: usize,
    pub available_native: usize,
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    pub fungible: Vec<LockId>,
    pub native: Vec<LockId>,
    pub fungible_groups: Vec<GroupKey>,
    pub native_group: Option<GroupKey>,
    pub total_selected_native_amount: Amount,
}

/// Outcome of a reinvest estimate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinvestEstimate {
    pub superseded: bool,
    pub duration: Option<u64>,
    pub limits: Option<ItemLimits>,
    pub state: EstimateState,
}

/// Entry point for the UI: selection, estimates, settlement and refresh.
#[derive(Debug)]
pub struct LockDesk {
    workspace: Arc<Workspace>,
    estimator: YieldEstimator,
    settlement: SettlementOrchestrator,
    catalog: Arc<dyn ItemCatalog>,
    default_reinvest_duration: u64,
}

impl LockDesk {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        source: Arc<dyn LedgerSource>,
        oracle: Arc<dyn ProfitOracle>,
        catalog: Arc<dyn ItemCatalog>,
        gateway: Arc<dyn SettlementGateway>,
        default_reinvest_duration: u64,
    ) -> Self {
        let workspace = Arc::new(Workspace::new(session, LockRepository::new(source.clone())));
        let settlement = SettlementOrchestrator::new(
            workspace.clone(),
            catalog.clone(),
            gateway,
            source.clone(),
        );
        Self {
            workspace,
            estimator: YieldEstimator::new(oracle, source),
            settlement,
            catalog,
            default_reinvest_duration,
        }
    }

    /// Build a desk whose collaborators are all served by one ledger client.
    pub fn from_ledger<L>(
        ledger: Arc<L>,
        session: Arc<dyn SessionProvider>,
        default_reinvest_duration: u64,
    ) -> Self
    where
        L: LedgerSource + ProfitOracle + ItemCatalog + SettlementGateway + 'static,
    {
        Self::new(
            session,
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            ledger,
            default_reinvest_duration,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.workspace.account().is_some()
    }

    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RepositoryError> {
        self.workspace.refresh().await
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.workspace.snapshot()
    }

    pub fn locks_view(&self) -> LocksView {
        let now = now_secs();
        let connected = self.is_connected();
        self.workspace.with_engine(|engine| {
            let engine: &SelectionEngine = engine;
            let snapshot = engine.snapshot().clone();
            let view = |lock: &Lock| lock_view(engine, lock, now);
            LocksView {
                generation: snapshot.generation,
                fetched_at: snapshot.fetched_at,
                connected,
                available_fungible: snapshot.available_count(Ledger::Fungible, now),
                available_native: snapshot.available_count(Ledger::Native, now),
                groups: snapshot
                    .groups
                    .iter()
                    .map(|group| GroupView {
                        key: group.key,
                        rows: max_row_count(group),
                        outstanding_native_amount: group.outstanding_native_amount(),
                        fungible: group.fungible.iter().map(&view).collect(),
                        native: group.native.iter().map(&view).collect(),
                    })
                    .collect(),
            }
        })
    }

    pub fn selection(&self) -> SelectionView {
        self.workspace.with_engine(|engine| SelectionView {
            fungible: engine.selected(Ledger::Fungible),
            native: engine.selected(Ledger::Native),
            fungible_groups: engine.selected_fungible_groups().into_iter().collect(),
            native_group: engine.native_group(),
            total_selected_native_amount: engine.total_selected_native_amount(),
        })
    }

    /// Toggle a lock on the ledger named by its id. Fungible locks that would mix the
    /// pending queue with token groups are refused.
    pub fn toggle(&self, id: &LockId) -> Result<SelectionChange, SelectionError> {
        let now = now_secs();
        self.workspace.with_engine(|engine| match id.ledger {
            Ledger::Fungible => {
                if engine.fungible_conflicts(id) {
                    return Err(SelectionError::PendingQueueConflict(*id));
                }
                engine.toggle_fungible(id, now).map(SelectionChange::from)
            }
            Ledger::Native => engine.toggle_native(id, now).map(SelectionChange::from),
        })
    }

    pub fn select_all_matured(&self, ledger: Ledger) -> SelectionView {
        let now = now_secs();
        self.workspace
            .with_engine(|engine| engine.select_all_matured(ledger, now));
        self.selection()
    }

    pub fn clear(&self) {
        self.workspace.with_engine(SelectionEngine::clear);
    }

    pub fn estimate(&self) -> EstimateState {
        self.estimator.current()
    }

    /// Recompute the projected yield of reinvesting the native selection.
    ///
    /// Without a requested duration the configured default is used, clamped into the
    /// item's lock-duration range.
    pub async fn estimate_reinvest(&self, duration: Option<u64>) -> ReinvestEstimate {
        let (group, total) = self.workspace.with_engine(|engine| {
            (engine.native_group(), engine.total_selected_native_amount())
        });

        let Some(token_id) = group.and_then(|g| g.token_id()) else {
            let duration = duration.unwrap_or(self.default_reinvest_duration);
            let request = EstimateRequest {
                amount: Amount::ZERO,
                duration,
                apr_bps: 0,
                strategy_id: 0,
            };
            let outcome = self.estimator.recompute(request).await;
            let superseded = outcome == EstimateOutcome::Superseded;
            return self.reinvest_estimate(superseded, Some(duration), None);
        };

        let limits = match self.catalog.item_limits(token_id.get()).await {
            Ok(limits) => limits,
            Err(e) => {
                self.estimator
                    .mark_unavailable(format!("item metadata unavailable: {}", e));
                return self.reinvest_estimate(false, duration, None);
            }
        };

        let duration = duration.unwrap_or_else(|| {
            let max = limits.max_lock_duration.max(limits.min_lock_duration);
            self.default_reinvest_duration
                .clamp(limits.min_lock_duration, max)
        });

        if limits.exceeds_ceiling(total) {
            debug!(%total, max = %limits.max_investment, "selection above investment ceiling");
            self.estimator
                .mark_unavailable("selected amount exceeds maximum investment");
            return self.reinvest_estimate(false, Some(duration), Some(limits));
        }

        let outcome = self
            .estimator
            .recompute(EstimateRequest::for_item(&limits, total, duration))
            .await;
        self.reinvest_estimate(
            outcome == EstimateOutcome::Superseded,
            Some(duration),
            Some(limits),
        )
    }

    fn reinvest_estimate(
        &self,
        superseded: bool,
        duration: Option<u64>,
        limits: Option<ItemLimits>,
    ) -> ReinvestEstimate {
        ReinvestEstimate {
            superseded,
            duration,
            limits,
            state: self.estimator.current(),
        }
    }

    pub async fn execute(
        &self,
        ledger: Ledger,
        action: SettlementAction,
        duration: Option<u64>,
    ) -> Result<SettlementResult, SettlementError> {
        self.settlement.execute(ledger, action, duration).await
    }

    pub async fn invest(
        &self,
        token_id: u64,
        duration: u64,
        amount: Amount,
        use_deposit: bool,
    ) -> Result<InvestmentResult, SettlementError> {
        self.settlement
            .invest(token_id, duration, amount, use_deposit)
            .await
    }

    pub fn settlement_in_progress(&self) -> bool {
        self.settlement.is_in_flight()
    }
}

fn lock_view(engine: &SelectionEngine, lock: &Lock, now: u64) -> LockView {
    let selected = engine.is_selected(&lock.id);
    let selectable = selected
        || (is_settleable(lock, now)
            && !(lock.ledger() == Ledger::Fungible && engine.fungible_conflicts(&lock.id)));
    LockView {
        id: lock.id,
        amount: lock.amount,
        lock_end: lock.lock_end,
        claimed: lock.claimed,
        matured: has_matured(lock, now),
        selected,
        selectable,
    }
}
