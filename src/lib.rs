pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{DataSourceError, HttpLedger, MockLedger, StaticSession};
pub use domain::{Address, Amount, GroupKey, Ledger, Lock, LockId, SettlementAction};
pub use error::AppError;
pub use orchestration::LockDesk;
