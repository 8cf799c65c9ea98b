//! Scheduled threshold monitoring.
//!
//! The [`monitor::ThresholdMonitor`] drives periodic evaluation passes:
//! each tick samples every metric referenced by an enabled rule into the
//! [`baseline::BaselineTracker`], runs the alert engine, and fans newly
//! triggered alerts out through the notification dispatcher. Passes are
//! single-flight — a forced evaluation and a scheduled tick never run
//! concurrently.

pub mod baseline;
pub mod monitor;
