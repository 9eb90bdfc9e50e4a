//! Selection state over the live aggregation snapshot.
//!
//! Two independent sets, one per ledger. Each entry remembers the lock record and the
//! snapshot generation it was selected against, so a selection that outlives a refresh
//! can be re-validated before its indices are sent anywhere.

use super::aggregator::{is_settleable, Snapshot};
use crate::domain::{Amount, GroupKey, ItemLimits, Ledger, Lock, LockId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("lock {0} is not in the current snapshot")]
    UnknownLock(LockId),
    #[error("lock {id} belongs to the {actual} ledger, expected {expected}")]
    WrongLedger {
        id: LockId,
        expected: Ledger,
        actual: Ledger,
    },
    #[error("lock {0} would mix the pending queue with token groups")]
    PendingQueueConflict(LockId),
    #[error("lock {0} is claimed or has not matured yet")]
    NotSettleable(LockId),
}

/// Reasons a selection cannot be handed to settlement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionCheckError {
    #[error("nothing selected on the {0} ledger")]
    Empty(Ledger),
    #[error("selection no longer matches the ledger: {}", format_ids(.0))]
    Stale(Vec<LockId>),
}

fn format_ids(ids: &[LockId]) -> String {
    ids.iter().map(LockId::to_string).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeToggle {
    Added,
    Removed,
    /// The lock came from another group; the previous native selection was discarded.
    Replaced { discarded: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selected {
    generation: u64,
    lock: Lock,
}

#[derive(Debug, Clone)]
pub struct SelectionEngine {
    snapshot: Arc<Snapshot>,
    fungible: BTreeMap<LockId, Selected>,
    native: BTreeMap<LockId, Selected>,
}

impl SelectionEngine {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self {
            snapshot,
            fungible: BTreeMap::new(),
            native: BTreeMap::new(),
        }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Swap in a freshly aggregated snapshot. Selections are kept as they are.
    pub fn install_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshot = snapshot;
    }

    fn set(&self, ledger: Ledger) -> &BTreeMap<LockId, Selected> {
        match ledger {
            Ledger::Fungible => &self.fungible,
            Ledger::Native => &self.native,
        }
    }

    fn resolve(
        &self,
        id: &LockId,
        expected: Ledger,
        now: u64,
    ) -> Result<Selected, SelectionError> {
        if id.ledger != expected {
            return Err(SelectionError::WrongLedger {
                id: *id,
                expected,
                actual: id.ledger,
            });
        }
        let lock = self
            .snapshot
            .find(id)
            .ok_or(SelectionError::UnknownLock(*id))?;
        if !is_settleable(lock, now) {
            return Err(SelectionError::NotSettleable(*id));
        }
        Ok(Selected {
            generation: self.snapshot.generation,
            lock: *lock,
        })
    }

    /// Flip membership of a fungible lock. Adding requires a matured, unclaimed lock of
    /// the live snapshot; removing always succeeds.
    pub fn toggle_fungible(&mut self, id: &LockId, now: u64) -> Result<Toggle, SelectionError> {
        if self.fungible.remove(id).is_some() {
            debug!(%id, "fungible lock deselected");
            return Ok(Toggle::Removed);
        }
        let entry = self.resolve(id, Ledger::Fungible, now)?;
        self.fungible.insert(*id, entry);
        debug!(%id, "fungible lock selected");
        Ok(Toggle::Added)
    }

    pub fn toggle_native(
        &mut self,
        id: &LockId,
        now: u64,
    ) -> Result<NativeToggle, SelectionError> {
        if self.native.remove(id).is_some() {
            debug!(%id, "native lock deselected");
            return Ok(NativeToggle::Removed);
        }
        let entry = self.resolve(id, Ledger::Native, now)?;

        match self.native_group() {
            Some(current) if current != id.group => Ok(self.replace_on_cross_group(id, entry)),
            _ => {
                self.native.insert(*id, entry);
                debug!(%id, "native lock selected");
                Ok(NativeToggle::Added)
            }
        }
    }

    /// Native settlement always targets a single group: selecting a lock of another
    /// group drops the whole previous native selection and keeps only the new lock.
    fn replace_on_cross_group(&mut self, id: &LockId, entry: Selected) -> NativeToggle {
        let discarded = self.native.len();
        self.native.clear();
        self.native.insert(*id, entry);
        debug!(%id, discarded, "native selection replaced by lock from another group");
        NativeToggle::Replaced { discarded }
    }

    pub fn select_all_matured(&mut self, ledger: Ledger, now: u64) {
        match ledger {
            Ledger::Fungible => self.select_all_matured_fungible(now),
            Ledger::Native => self.select_all_matured_native(now),
        }
    }

    /// Replace the fungible set with every matured lock on one side of the pending-queue
    /// split: the side of the current selection, else token groups when any have matured.
    fn select_all_matured_fungible(&mut self, now: u64) {
        let matured = self.matured_entries(Ledger::Fungible, now, None);
        let pending = match self.fungible.keys().next() {
            Some(id) => id.group.is_pending_queue(),
            None => matured.keys().all(|id| id.group.is_pending_queue()),
        };
        self.fungible = matured
            .into_iter()
            .filter(|(id, _)| id.group.is_pending_queue() == pending)
            .collect();
    }

    fn select_all_matured_native(&mut self, now: u64) {
        let target_group = match self.native_group() {
            Some(group) => Some(group),
            None => self
                .snapshot
                .locks(Ledger::Native)
                .find(|lock| is_settleable(lock, now))
                .map(Lock::group),
        };
        let Some(group) = target_group else {
            self.native.clear();
            return;
        };

        let matured = self.matured_entries(Ledger::Native, now, Some(group));
        let already_selected = !self.native.is_empty()
            && matured.keys().all(|id| self.native.contains_key(id));
        if already_selected {
            self.native.clear();
        } else {
            self.native = matured;
        }
    }

    fn matured_entries(
        &self,
        ledger: Ledger,
        now: u64,
        group: Option<GroupKey>,
    ) -> BTreeMap<LockId, Selected> {
        let generation = self.snapshot.generation;
        self.snapshot
            .locks(ledger)
            .filter(|lock| is_settleable(lock, now))
            .filter(|lock| group.map_or(true, |g| lock.group() == g))
            .map(|lock| (lock.id, Selected { generation, lock: *lock }))
            .collect()
    }

    pub fn clear(&mut self) {
        self.fungible.clear();
        self.native.clear();
    }

    pub fn is_selected(&self, id: &LockId) -> bool {
        self.set(id.ledger).contains_key(id)
    }

    pub fn selected(&self, ledger: Ledger) -> Vec<LockId> {
        self.set(ledger).keys().copied().collect()
    }

    pub fn has_any_selection(&self) -> bool {
        !self.fungible.is_empty() || !self.native.is_empty()
    }

    /// Group shared by every selected native lock.
    pub fn native_group(&self) -> Option<GroupKey> {
        self.native.keys().next().map(|id| id.group)
    }

    pub fn selected_fungible_groups(&self) -> BTreeSet<GroupKey> {
        self.fungible.keys().map(|id| id.group).collect()
    }

    /// Whether selecting `id` would put pending-queue and token-group locks in the same
    /// fungible batch. Callers use this to disable the lock instead of merging.
    pub fn fungible_conflicts(&self, id: &LockId) -> bool {
        if id.ledger != Ledger::Fungible || self.fungible.contains_key(id) {
            return false;
        }
        let pending = id.group.is_pending_queue();
        self.fungible
            .keys()
            .any(|selected| selected.group.is_pending_queue() != pending)
    }

    /// Sum of the live amounts of the selected native locks.
    pub fn total_selected_native_amount(&self) -> Amount {
        self.snapshot
            .locks(Ledger::Native)
            .filter(|lock| self.native.contains_key(&lock.id))
            .map(|lock| lock.amount)
            .sum()
    }

    pub fn exceeds_investment_ceiling(&self, limits: &ItemLimits) -> bool {
        limits.exceeds_ceiling(self.total_selected_native_amount())
    }

    /// The selected locks of a ledger, provided every one of them still matches the
    /// live snapshot: either it was selected against the live generation, or the live
    /// snapshot holds an identical record under the same id.
    pub fn validated_selection(&self, ledger: Ledger) -> Result<Vec<Lock>, SelectionCheckError> {
        let set = self.set(ledger);
        if set.is_empty() {
            return Err(SelectionCheckError::Empty(ledger));
        }

        let live_generation = self.snapshot.generation;
        let mut locks = Vec::with_capacity(set.len());
        let mut stale = Vec::new();
        for (id, entry) in set {
            match self.snapshot.find(id) {
                Some(live) if entry.generation == live_generation || *live == entry.lock => {
                    locks.push(*live)
                }
                _ => stale.push(*id),
            }
        }

        if !stale.is_empty() {
            return Err(SelectionCheckError::Stale(stale));
        }
        Ok(locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregator::aggregate;
    use crate::domain::LockRecord;

    const NOW: u64 = 1_000;

    fn lock(ledger: Ledger, index: u32, token_id: u64, amount: u128, lock_end: u64) -> Lock {
        Lock::from_record(
            ledger,
            index,
            &LockRecord {
                token_id,
                amount: Amount::new(amount),
                lock_end,
                claimed: false,
            },
        )
    }

    fn engine(fungible: Vec<Lock>, native: Vec<Lock>) -> SelectionEngine {
        SelectionEngine::new(Arc::new(Snapshot::new(1, NOW, aggregate(fungible, native))))
    }

    fn nid(group: u64, index: u32) -> LockId {
        LockId::new(Ledger::Native, GroupKey::from_raw(group), index)
    }

    fn fid(group: u64, index: u32) -> LockId {
        LockId::new(Ledger::Fungible, GroupKey::from_raw(group), index)
    }

    #[test]
    fn test_toggle_native_rejects_unknown_and_wrong_ledger() {
        let mut e = engine(vec![lock(Ledger::Fungible, 0, 7, 1, 1)], vec![]);
        assert_eq!(
            e.toggle_native(&nid(7, 0), NOW),
            Err(SelectionError::UnknownLock(nid(7, 0)))
        );
        assert!(matches!(
            e.toggle_native(&fid(7, 0), NOW),
            Err(SelectionError::WrongLedger { .. })
        ));
    }

    #[test]
    fn test_fungible_conflicts_with_pending_queue() {
        let mut e = engine(
            vec![
                lock(Ledger::Fungible, 0, 0, 1, 1),
                lock(Ledger::Fungible, 1, 7, 1, 1),
                lock(Ledger::Fungible, 2, 8, 1, 1),
            ],
            vec![],
        );
        assert!(!e.fungible_conflicts(&fid(7, 1)));
        e.toggle_fungible(&fid(0, 0), NOW).unwrap();
        assert!(e.fungible_conflicts(&fid(7, 1)));
        assert!(!e.fungible_conflicts(&fid(0, 0)));

        e.clear();
        e.toggle_fungible(&fid(7, 1), NOW).unwrap();
        assert!(e.fungible_conflicts(&fid(0, 0)));
        assert!(!e.fungible_conflicts(&fid(8, 2)));
    }

    #[test]
    fn test_validated_selection_after_identical_refresh() {
        let native = vec![lock(Ledger::Native, 0, 7, 100, 1)];
        let mut e = engine(vec![], native.clone());
        e.toggle_native(&nid(7, 0), NOW).unwrap();

        e.install_snapshot(Arc::new(Snapshot::new(2, NOW, aggregate(vec![], native))));
        let locks = e.validated_selection(Ledger::Native).unwrap();
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_validated_selection_detects_changed_record() {
        let mut e = engine(vec![], vec![lock(Ledger::Native, 0, 7, 100, 1)]);
        e.toggle_native(&nid(7, 0), NOW).unwrap();

        let mut claimed = lock(Ledger::Native, 0, 7, 100, 1);
        claimed.claimed = true;
        e.install_snapshot(Arc::new(Snapshot::new(2, NOW, aggregate(vec![], vec![claimed]))));

        assert_eq!(
            e.validated_selection(Ledger::Native),
            Err(SelectionCheckError::Stale(vec![nid(7, 0)]))
        );
        assert_eq!(e.total_selected_native_amount(), Amount::new(100));
    }

    #[test]
    fn test_validated_selection_empty() {
        let e = engine(vec![], vec![]);
        assert_eq!(
            e.validated_selection(Ledger::Fungible),
            Err(SelectionCheckError::Empty(Ledger::Fungible))
        );
    }

    #[test]
    fn test_stale_id_can_still_be_deselected() {
        let mut e = engine(vec![], vec![lock(Ledger::Native, 0, 7, 100, 1)]);
        e.toggle_native(&nid(7, 0), NOW).unwrap();
        e.install_snapshot(Arc::new(Snapshot::new(2, NOW, Vec::new())));

        assert_eq!(e.toggle_native(&nid(7, 0), NOW), Ok(NativeToggle::Removed));
        assert!(!e.has_any_selection());
    }

    #[test]
    fn test_toggle_rejects_immature_and_claimed_locks() {
        let mut claimed = lock(Ledger::Native, 1, 7, 100, 1);
        claimed.claimed = true;
        let mut e = engine(
            vec![lock(Ledger::Fungible, 0, 7, 1, NOW + 1)],
            vec![lock(Ledger::Native, 0, 7, 100, 0), claimed],
        );

        assert_eq!(
            e.toggle_fungible(&fid(7, 0), NOW),
            Err(SelectionError::NotSettleable(fid(7, 0)))
        );
        assert_eq!(
            e.toggle_native(&nid(7, 0), NOW),
            Err(SelectionError::NotSettleable(nid(7, 0)))
        );
        assert_eq!(
            e.toggle_native(&nid(7, 1), NOW),
            Err(SelectionError::NotSettleable(nid(7, 1)))
        );
        assert!(!e.has_any_selection());

        assert_eq!(e.toggle_fungible(&fid(7, 0), NOW + 1), Ok(Toggle::Added));
    }
}
