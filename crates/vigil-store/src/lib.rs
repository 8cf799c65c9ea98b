//! Persistence boundary for rules and alerts.
//!
//! The engine only depends on the [`RuleStore`] / [`AlertStore`] traits;
//! what sits behind them (a SQL database in the host application, the
//! bundled [`memory::MemoryStore`] in tests and embedded setups) is the
//! host's choice. Operations either fully apply or return an error — no
//! further transaction semantics are assumed.

pub mod error;
pub mod memory;


use chrono::{DateTime, Utc};
use error::Result;
use vigil_common::types::{Alert, AlertRule};

/// Storage for alert rules.
///
/// Implementations must be safe to share across threads (`Send + Sync`):
/// rule CRUD from the host API runs concurrently with the scheduler's
/// evaluation passes.
pub trait RuleStore: Send + Sync {
    /// Persists a new rule. Fails with [`error::StoreError::Conflict`] if a
    /// rule with the same name already exists.
    fn insert_rule(&self, rule: AlertRule) -> Result<AlertRule>;

    /// Replaces an existing rule (matched by id).
    fn update_rule(&self, rule: AlertRule) -> Result<AlertRule>;

    /// Deletes a rule by id. Returns true if found and removed.
    fn delete_rule(&self, id: &str) -> Result<bool>;

    fn get_rule(&self, id: &str) -> Result<Option<AlertRule>>;

    fn find_rule_by_name(&self, name: &str) -> Result<Option<AlertRule>>;

    /// Returns enabled rules in insertion order.
    fn find_enabled_rules(&self) -> Result<Vec<AlertRule>>;

    fn list_rules(&self) -> Result<Vec<AlertRule>>;
}

/// Storage for alert instances.
pub trait AlertStore: Send + Sync {
    fn insert_alert(&self, alert: Alert) -> Result<Alert>;

    /// Replaces an existing alert (matched by id).
    fn update_alert(&self, alert: Alert) -> Result<Alert>;

    fn get_alert(&self, id: &str) -> Result<Option<Alert>>;

    /// Alerts currently in `Active` status.
    fn find_active_alerts(&self) -> Result<Vec<Alert>>;

    /// Unresolved (`Active` or `Acknowledged`) alerts for a rule triggered at
    /// or after `since`. This backs the cooldown check: an acknowledged alert
    /// still blocks re-trigger.
    fn find_unresolved_for_rule(&self, rule_id: &str, since: DateTime<Utc>) -> Result<Vec<Alert>>;

    /// Number of alerts triggered at or after `since`, any status.
    fn count_triggered_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Deletes `Resolved` alerts whose `resolved_at` is before `cutoff`.
    /// Active and acknowledged alerts are never touched. Returns the number
    /// deleted.
    fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
