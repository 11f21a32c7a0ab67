//! Application layer: command orchestration, queries, snapshots and
//! projection reconciliation.

pub mod command_handlers;
pub mod query_handlers;
pub mod reconciliation;
pub mod snapshot;
