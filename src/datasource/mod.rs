//! Boundary traits for the remote collaborators: the lock ledgers, the profit oracle,
//! the item catalog, the settlement gateway and the wallet session.

use crate::domain::{
    Address, Amount, EstimateRequest, FeeSettings, InvestmentOrder, ItemLimits, LockRecord,
    SettlementBatch, SettlementReceipt,
};
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;
pub mod session;

pub use http::HttpLedger;
pub use mock::MockLedger;
pub use session::{SessionProvider, StaticSession};

/// Read access to the two lock ledgers and their configuration.
///
/// Lock sequences are returned in remote order; a record's position is its
/// external sequence index.
#[async_trait]
pub trait LedgerSource: Send + Sync + fmt::Debug {
    /// Fetch every fungible-ledger lock of an account.
    async fn fetch_fungible_locks(&self, account: &Address)
        -> Result<Vec<LockRecord>, DataSourceError>;

    /// Fetch every native-ledger lock of an account.
    async fn fetch_native_locks(&self, account: &Address)
        -> Result<Vec<LockRecord>, DataSourceError>;

    /// Fetch the fee configuration (basis points).
    async fn fetch_fee_settings(&self) -> Result<FeeSettings, DataSourceError>;

    /// Fetch the account's native deposit held by the vault.
    async fn fetch_vault_balance(&self, account: &Address) -> Result<Amount, DataSourceError>;
}

/// Expected-profit oracle. Returns gross yield before fees.
#[async_trait]
pub trait ProfitOracle: Send + Sync + fmt::Debug {
    async fn expected_profit(&self, request: &EstimateRequest) -> Result<Amount, DataSourceError>;
}

/// Item metadata keyed by external token id.
#[async_trait]
pub trait ItemCatalog: Send + Sync + fmt::Debug {
    async fn item_limits(&self, token_id: u64) -> Result<ItemLimits, DataSourceError>;
}

/// Write access to the remote ledger. Calls are not idempotent and are never retried.
#[async_trait]
pub trait SettlementGateway: Send + Sync + fmt::Debug {
    async fn submit(
        &self,
        account: &Address,
        batch: &SettlementBatch,
    ) -> Result<SettlementReceipt, DataSourceError>;

    async fn invest(
        &self,
        account: &Address,
        order: &InvestmentOrder,
    ) -> Result<SettlementReceipt, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// The remote ledger refused the call (e.g., reverted transaction)
    Rejected(String),
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
