//! Shared domain types for the vigil alerting core.
//!
//! Everything the engine, monitor, and notification crates exchange lives
//! here: severities, conditions, rule and alert records, metric samples,
//! recipients, and the monitor configuration.

pub mod config;
pub mod id;
pub mod types;
