use crate::domain::{Amount, GroupKey, Ledger, Lock, LockId};
use serde::Serialize;

/// Locks of both ledgers sharing one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub key: GroupKey,
    pub fungible: Vec<Lock>,
    pub native: Vec<Lock>,
}

impl Group {
    fn new(key: GroupKey) -> Self {
        Self {
            key,
            fungible: Vec::new(),
            native: Vec::new(),
        }
    }

    pub fn locks(&self, ledger: Ledger) -> &[Lock] {
        match ledger {
            Ledger::Fungible => &self.fungible,
            Ledger::Native => &self.native,
        }
    }

    /// Native amount still locked in this group (unclaimed locks only).
    pub fn outstanding_native_amount(&self) -> Amount {
        self.native
            .iter()
            .filter(|lock| !lock.claimed)
            .map(|lock| lock.amount)
            .sum()
    }
}

/// Group locks by key, keeping first-seen group order (fungible sequence first)
/// and sequence order within each group.
pub fn aggregate(fungible: Vec<Lock>, native: Vec<Lock>) -> Vec<Group> {
    fn slot(groups: &mut Vec<Group>, key: GroupKey) -> usize {
        match groups.iter().position(|g| g.key == key) {
            Some(pos) => pos,
            None => {
                groups.push(Group::new(key));
                groups.len() - 1
            }
        }
    }

    let mut groups: Vec<Group> = Vec::new();

    for lock in fungible {
        let pos = slot(&mut groups, lock.group());
        groups[pos].fungible.push(lock);
    }
    for lock in native {
        let pos = slot(&mut groups, lock.group());
        groups[pos].native.push(lock);
    }

    groups
}

/// True iff the lock has a maturity timestamp and it is not in the future.
pub fn has_matured(lock: &Lock, now: u64) -> bool {
    lock.lock_end != 0 && lock.lock_end <= now
}

/// Matured and not yet claimed: the only locks a settlement can act on.
pub fn is_settleable(lock: &Lock, now: u64) -> bool {
    has_matured(lock, now) && !lock.claimed
}

/// Rows needed to display both ledger columns of a group side by side.
pub fn max_row_count(group: &Group) -> usize {
    group.fungible.len().max(group.native.len())
}

/// Immutable result of one repository fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generation: u64,
    /// Epoch seconds at fetch completion.
    pub fetched_at: u64,
    pub groups: Vec<Group>,
}

impl Snapshot {
    pub fn new(generation: u64, fetched_at: u64, groups: Vec<Group>) -> Self {
        Self {
            generation,
            fetched_at,
            groups,
        }
    }

    /// The snapshot in place before the first fetch.
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    pub fn find(&self, id: &LockId) -> Option<&Lock> {
        self.groups
            .iter()
            .find(|g| g.key == id.group)?
            .locks(id.ledger)
            .iter()
            .find(|lock| lock.id == *id)
    }

    pub fn group(&self, key: GroupKey) -> Option<&Group> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Every lock of a ledger, in group order.
    pub fn locks(&self, ledger: Ledger) -> impl Iterator<Item = &Lock> + '_ {
        self.groups.iter().flat_map(move |g| g.locks(ledger).iter())
    }

    pub fn available_count(&self, ledger: Ledger, now: u64) -> usize {
        self.locks(ledger).filter(|lock| is_settleable(lock, now)).count()
    }

    pub fn has_any_available(&self, now: u64) -> bool {
        self.available_count(Ledger::Fungible, now) > 0
            || self.available_count(Ledger::Native, now) > 0
    }
}
