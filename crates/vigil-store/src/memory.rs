use crate::error::{Result, StoreError};
use crate::{AlertStore, RuleStore};
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use vigil_common::types::{Alert, AlertRule, AlertStatus};

/// In-memory implementation of both store traits.
///
/// Backed by `RwLock`ed vectors so readers observe a consistent snapshot
/// while the evaluation pass mutates state. Insertion order is preserved,
/// which keeps listings deterministic in tests.
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<Vec<AlertRule>>,
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rules_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<AlertRule>> {
        self.rules.read().unwrap_or_else(|p| p.into_inner())
    }

    fn rules_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<AlertRule>> {
        self.rules.write().unwrap_or_else(|p| p.into_inner())
    }

    fn alerts_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Alert>> {
        self.alerts.read().unwrap_or_else(|p| p.into_inner())
    }

    fn alerts_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Alert>> {
        self.alerts.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl RuleStore for MemoryStore {
    fn insert_rule(&self, rule: AlertRule) -> Result<AlertRule> {
        let mut rules = self.rules_write();
        if rules.iter().any(|r| r.name == rule.name) {
            return Err(StoreError::Conflict(format!(
                "rule name already exists: {}",
                rule.name
            )));
        }
        rules.push(rule.clone());
        Ok(rule)
    }

    fn update_rule(&self, rule: AlertRule) -> Result<AlertRule> {
        let mut rules = self.rules_write();
        if rules
            .iter()
            .any(|r| r.id != rule.id && r.name == rule.name)
        {
            return Err(StoreError::Conflict(format!(
                "rule name already exists: {}",
                rule.name
            )));
        }
        let slot = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "alert_rule",
                id: rule.id.clone(),
            })?;
        *slot = rule.clone();
        Ok(rule)
    }

    fn delete_rule(&self, id: &str) -> Result<bool> {
        let mut rules = self.rules_write();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        Ok(rules.len() < before)
    }

    fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        Ok(self.rules_read().iter().find(|r| r.id == id).cloned())
    }

    fn find_rule_by_name(&self, name: &str) -> Result<Option<AlertRule>> {
        Ok(self.rules_read().iter().find(|r| r.name == name).cloned())
    }

    fn find_enabled_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self
            .rules_read()
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }

    fn list_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self.rules_read().clone())
    }
}

impl AlertStore for MemoryStore {
    fn insert_alert(&self, alert: Alert) -> Result<Alert> {
        self.alerts_write().push(alert.clone());
        Ok(alert)
    }

    fn update_alert(&self, alert: Alert) -> Result<Alert> {
        let mut alerts = self.alerts_write();
        let slot = alerts
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "alert",
                id: alert.id.clone(),
            })?;
        *slot = alert.clone();
        Ok(alert)
    }

    fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        Ok(self.alerts_read().iter().find(|a| a.id == id).cloned())
    }

    fn find_active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self
            .alerts_read()
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .cloned()
            .collect())
    }

    fn find_unresolved_for_rule(&self, rule_id: &str, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        Ok(self
            .alerts_read()
            .iter()
            .filter(|a| {
                a.rule_id.as_deref() == Some(rule_id)
                    && matches!(a.status, AlertStatus::Active | AlertStatus::Acknowledged)
                    && a.triggered_at >= since
            })
            .cloned()
            .collect())
    }

    fn count_triggered_since(&self, since: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .alerts_read()
            .iter()
            .filter(|a| a.triggered_at >= since)
            .count() as u64)
    }

    fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut alerts = self.alerts_write();
        let before = alerts.len();
        alerts.retain(|a| {
            !(a.status == AlertStatus::Resolved
                && a.resolved_at.is_some_and(|t| t < cutoff))
        });
        Ok((before - alerts.len()) as u64)
    }
}
