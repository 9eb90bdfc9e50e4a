//! Pure computation over lock snapshots: grouping, selection rules and yield estimates.

pub mod aggregator;
pub mod selection;
pub mod yield_estimator;

pub use aggregator::{aggregate, has_matured, is_settleable, max_row_count, Group, Snapshot};
pub use selection::{NativeToggle, SelectionCheckError, SelectionEngine, SelectionError, Toggle};
pub use yield_estimator::{
    apply_performance_fee, Estimate, EstimateOutcome, EstimateState, YieldEstimator,
};
