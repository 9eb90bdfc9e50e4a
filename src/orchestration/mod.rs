//! Stateful coordination: fetching, the shared workspace, settlement and the desk facade.

pub mod desk;
pub mod repository;
pub mod settlement;
pub mod workspace;

pub use desk::{
    GroupView, LockDesk, LockView, LocksView, ReinvestEstimate, SelectionChange, SelectionView,
};
pub use repository::{LockRepository, RepositoryError};
pub use settlement::{
    check_legality, plan_investment, InvestmentResult, SettlementError, SettlementOrchestrator,
    SettlementResult,
};
pub use workspace::Workspace;
