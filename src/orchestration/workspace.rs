use super::repository::{LockRepository, RepositoryError};
use crate::datasource::SessionProvider;
use crate::domain::{now_secs, Address};
use crate::engine::{aggregate, SelectionEngine, Snapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Live snapshot plus both selection sets, shared by the desk and the orchestrator.
///
/// The engine mutex is only taken for synchronous work and never held across an await.
#[derive(Debug)]
pub struct Workspace {
    session: Arc<dyn SessionProvider>,
    repository: LockRepository,
    engine: Mutex<SelectionEngine>,
    generation: AtomicU64,
}

impl Workspace {
    pub fn new(session: Arc<dyn SessionProvider>, repository: LockRepository) -> Self {
        Self {
            session,
            repository,
            engine: Mutex::new(SelectionEngine::new(Arc::new(Snapshot::empty()))),
            generation: AtomicU64::new(0),
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.session.current_account()
    }

    pub fn with_engine<T>(&self, f: impl FnOnce(&mut SelectionEngine) -> T) -> T {
        match self.engine.lock() {
            Ok(mut engine) => f(&mut engine),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.with_engine(|engine| engine.snapshot().clone())
    }

    /// Re-fetch both ledgers and install a new snapshot. Selections are left alone.
    ///
    /// Without a connected account the snapshot becomes empty. On failure the previous
    /// snapshot stays in place. The generation is reserved before fetching, so a slow
    /// refresh that finishes after a later one is discarded.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RepositoryError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let groups = match self.account() {
            Some(account) => {
                let (fungible, native) = self.repository.fetch_all(&account).await?;
                aggregate(fungible, native)
            }
            None => Vec::new(),
        };
        let snapshot = Arc::new(Snapshot::new(generation, now_secs(), groups));

        let installed = self.with_engine(|engine| {
            if engine.snapshot().generation < generation {
                engine.install_snapshot(snapshot.clone());
                true
            } else {
                false
            }
        });

        if installed {
            info!(
                generation,
                groups = snapshot.groups.len(),
                "installed lock snapshot"
            );
            Ok(snapshot)
        } else {
            debug!(generation, "discarded snapshot overtaken by a later refresh");
            Ok(self.snapshot())
        }
    }
}
