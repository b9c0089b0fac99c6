//! Remote synchronization
//!
//! Reconciles the local archive directory against the remote store after all
//! jobs have run.

pub mod reconcile;

pub use reconcile::{
    filter_listing, plan_reconciliation, LocalAction, ReconcilePlan, ReconcileReport,
    ReconciliationEngine,
};
