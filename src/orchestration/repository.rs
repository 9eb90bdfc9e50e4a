use crate::datasource::{DataSourceError, LedgerSource};
use crate::domain::{Address, Ledger, Lock, LockRecord};
use futures::future::try_join;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Reads both lock ledgers of an account and assigns external sequence indices.
#[derive(Debug, Clone)]
pub struct LockRepository {
    source: Arc<dyn LedgerSource>,
}

impl LockRepository {
    pub fn new(source: Arc<dyn LedgerSource>) -> Self {
        Self { source }
    }

    pub async fn fetch_fungible_locks(
        &self,
        account: &Address,
    ) -> Result<Vec<Lock>, RepositoryError> {
        let records = self.source.fetch_fungible_locks(account).await?;
        Ok(index_records(Ledger::Fungible, &records))
    }

    pub async fn fetch_native_locks(
        &self,
        account: &Address,
    ) -> Result<Vec<Lock>, RepositoryError> {
        let records = self.source.fetch_native_locks(account).await?;
        Ok(index_records(Ledger::Native, &records))
    }

    /// Fetch both ledgers concurrently. Either failure fails the whole read.
    pub async fn fetch_all(
        &self,
        account: &Address,
    ) -> Result<(Vec<Lock>, Vec<Lock>), RepositoryError> {
        try_join(
            self.fetch_fungible_locks(account),
            self.fetch_native_locks(account),
        )
        .await
    }
}

/// Pair each record with its position in the remote sequence. Native records without a
/// token group are dropped; the remaining records keep their original indices.
fn index_records(ledger: Ledger, records: &[LockRecord]) -> Vec<Lock> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let index = match u32::try_from(index) {
                Ok(index) => index,
                Err(_) => {
                    warn!(%ledger, index, "lock sequence index out of range, skipping");
                    return None;
                }
            };
            if ledger == Ledger::Native && record.token_id == 0 {
                warn!(%ledger, index, "native lock without token group, skipping");
                return None;
            }
            Some(Lock::from_record(ledger, index, record))
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("lock repository unavailable: {0}")]
    Unavailable(String),
}

impl From<DataSourceError> for RepositoryError {
    fn from(err: DataSourceError) -> Self {
        RepositoryError::Unavailable(err.to_string())
    }
}
