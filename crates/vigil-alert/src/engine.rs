use crate::error::{AlertError, Result};
use crate::MetricSource;
use chrono::{Duration, Utc};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing;
use vigil_common::types::{
    Alert, AlertCondition, AlertRule, AlertStatus, CreateRuleRequest, RulePatch, Severity,
};
use vigil_store::{AlertStore, RuleStore};

/// Counts derived from the stores at call time, never cached.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub total_rules: u64,
    pub enabled_rules: u64,
    pub active_alerts: u64,
    pub critical_alerts: u64,
    pub alerts_today: u64,
}

pub struct AlertEngine {
    rules: Arc<dyn RuleStore>,
    alerts: Arc<dyn AlertStore>,
    source: Arc<dyn MetricSource>,
    default_cooldown_minutes: u32,
}

impl AlertEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        alerts: Arc<dyn AlertStore>,
        source: Arc<dyn MetricSource>,
        default_cooldown_minutes: u32,
    ) -> Self {
        Self {
            rules,
            alerts,
            source,
            default_cooldown_minutes,
        }
    }

    /// Validates and persists a new rule.
    ///
    /// The condition string is parsed against the fixed operator set here,
    /// once; evaluation never re-parses it.
    pub fn create_rule(&self, req: CreateRuleRequest) -> Result<AlertRule> {
        let condition: AlertCondition = match req.condition.parse() {
            Ok(c) => c,
            Err(_) => return Err(AlertError::InvalidCondition(req.condition)),
        };

        let now = Utc::now();
        let rule = AlertRule {
            id: vigil_common::id::next_id(),
            name: req.name,
            description: req.description,
            metric_name: req.metric_name,
            condition,
            threshold: req.threshold,
            severity: req.severity,
            enabled: req.enabled,
            cooldown_minutes: req
                .cooldown_minutes
                .unwrap_or(self.default_cooldown_minutes),
            notification_channels: req.notification_channels,
            additional_config: req.additional_config,
            created_at: now,
            updated_at: now,
        };

        let rule = self.rules.insert_rule(rule)?;
        tracing::info!(rule_id = %rule.id, name = %rule.name, "Alert rule created");
        Ok(rule)
    }

    /// Applies a partial update given as raw JSON.
    ///
    /// Unknown fields are rejected with [`AlertError::InvalidField`] rather
    /// than ignored.
    pub fn update_rule(&self, id: &str, patch: &serde_json::Value) -> Result<AlertRule> {
        let patch: RulePatch = serde_json::from_value(patch.clone())
            .map_err(|e| AlertError::InvalidField(e.to_string()))?;
        self.apply_patch(id, patch)
    }

    /// Typed variant of [`update_rule`](Self::update_rule).
    pub fn apply_patch(&self, id: &str, patch: RulePatch) -> Result<AlertRule> {
        let mut rule = self
            .rules
            .get_rule(id)?
            .ok_or_else(|| AlertError::RuleNotFound(id.to_string()))?;

        if let Some(name) = patch.name {
            rule.name = name;
        }
        if let Some(description) = patch.description {
            rule.description = Some(description);
        }
        if let Some(metric_name) = patch.metric_name {
            rule.metric_name = metric_name;
        }
        if let Some(condition) = patch.condition {
            match condition.parse() {
                Ok(c) => rule.condition = c,
                Err(_) => return Err(AlertError::InvalidCondition(condition)),
            }
        }
        if let Some(threshold) = patch.threshold {
            rule.threshold = threshold;
        }
        if let Some(severity) = patch.severity {
            rule.severity = severity;
        }
        if let Some(enabled) = patch.enabled {
            rule.enabled = enabled;
        }
        if let Some(cooldown_minutes) = patch.cooldown_minutes {
            rule.cooldown_minutes = cooldown_minutes;
        }
        if let Some(channels) = patch.notification_channels {
            rule.notification_channels = channels;
        }
        if let Some(config) = patch.additional_config {
            rule.additional_config = config;
        }
        rule.updated_at = Utc::now();

        let rule = self.rules.update_rule(rule)?;
        tracing::info!(rule_id = %rule.id, "Alert rule updated");
        Ok(rule)
    }

    /// Deletes a rule. Alerts already triggered by it keep their snapshots.
    pub fn delete_rule(&self, id: &str) -> Result<()> {
        if !self.rules.delete_rule(id)? {
            return Err(AlertError::RuleNotFound(id.to_string()));
        }
        tracing::info!(rule_id = %id, "Alert rule deleted");
        Ok(())
    }

    pub fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        Ok(self.rules.get_rule(id)?)
    }

    pub fn list_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self.rules.list_rules()?)
    }

    /// Runs one evaluation pass over every enabled rule.
    ///
    /// Returns only the alerts created by this pass. A store failure while
    /// listing rules aborts the pass; anything that goes wrong inside a
    /// single rule (missing metric value, store hiccup on insert, even a
    /// panic in condition code) is logged and that rule skipped.
    pub fn evaluate_all(&self) -> Result<Vec<Alert>> {
        self.evaluate_until(|| false)
    }

    /// Like [`evaluate_all`](Self::evaluate_all), but checks `cancelled`
    /// between rules and stops early when it returns true.
    pub fn evaluate_until(&self, cancelled: impl Fn() -> bool) -> Result<Vec<Alert>> {
        let rules = self.rules.find_enabled_rules()?;
        let mut triggered = Vec::new();

        for rule in rules {
            if cancelled() {
                tracing::info!("Evaluation pass cancelled before rule {}", rule.name);
                break;
            }

            match std::panic::catch_unwind(AssertUnwindSafe(|| self.evaluate_rule(&rule))) {
                Ok(Ok(Some(alert))) => triggered.push(alert),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Rule evaluation failed");
                }
                Err(_) => {
                    tracing::error!(rule_id = %rule.id, "Rule evaluation panicked");
                }
            }
        }

        Ok(triggered)
    }

    fn evaluate_rule(&self, rule: &AlertRule) -> Result<Option<Alert>> {
        let Some(current) = self.source.get_value(&rule.metric_name) else {
            tracing::debug!(
                rule_id = %rule.id,
                metric = %rule.metric_name,
                "No value this tick, rule skipped"
            );
            return Ok(None);
        };

        if !rule.condition.is_met(current, rule.threshold) {
            return Ok(None);
        }

        // Cooldown is keyed on the rule, not the metric: two rules watching
        // the same metric suppress independently. Acknowledged alerts still
        // block re-trigger; only resolution clears the way.
        let now = Utc::now();
        let since = now - Duration::minutes(i64::from(rule.cooldown_minutes));
        if !self.alerts.find_unresolved_for_rule(&rule.id, since)?.is_empty() {
            tracing::debug!(rule_id = %rule.id, "Alert suppressed (cooldown window)");
            return Ok(None);
        }

        let alert = Alert {
            id: vigil_common::id::next_id(),
            rule_id: Some(rule.id.clone()),
            rule_name: rule.name.clone(),
            rule_description: rule.description.clone(),
            metric_name: rule.metric_name.clone(),
            metric_value: current,
            condition: rule.condition,
            threshold_value: rule.threshold,
            severity: rule.severity,
            status: AlertStatus::Active,
            message: format!(
                "{} is {} threshold {:.1} (current: {:.2})",
                rule.metric_name,
                rule.condition.describe(),
                rule.threshold,
                current,
            ),
            triggered_at: now,
            acknowledged_at: None,
            resolved_at: None,
            acknowledged_by: None,
            resolved_by: None,
        };

        let alert = self.alerts.insert_alert(alert)?;
        tracing::info!(
            rule_id = %rule.id,
            metric = %rule.metric_name,
            value = current,
            severity = %rule.severity,
            "Alert triggered"
        );
        Ok(Some(alert))
    }

    /// Marks an `Active` alert acknowledged. Returns `Ok(false)` without
    /// changing anything when the alert is in any other state.
    pub fn acknowledge(&self, alert_id: &str, actor: &str) -> Result<bool> {
        let mut alert = self
            .alerts
            .get_alert(alert_id)?
            .ok_or_else(|| AlertError::AlertNotFound(alert_id.to_string()))?;

        if alert.status != AlertStatus::Active {
            return Ok(false);
        }

        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_at = Some(Utc::now());
        alert.acknowledged_by = Some(actor.to_string());
        self.alerts.update_alert(alert)?;
        tracing::info!(alert_id = %alert_id, actor = %actor, "Alert acknowledged");
        Ok(true)
    }

    /// Resolves an alert from `Active` or `Acknowledged`. Returns
    /// `Ok(false)` when the alert is already terminal.
    pub fn resolve(&self, alert_id: &str, actor: &str) -> Result<bool> {
        let mut alert = self
            .alerts
            .get_alert(alert_id)?
            .ok_or_else(|| AlertError::AlertNotFound(alert_id.to_string()))?;

        if !matches!(
            alert.status,
            AlertStatus::Active | AlertStatus::Acknowledged
        ) {
            return Ok(false);
        }

        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(Utc::now());
        alert.resolved_by = Some(actor.to_string());
        self.alerts.update_alert(alert)?;
        tracing::info!(alert_id = %alert_id, actor = %actor, "Alert resolved");
        Ok(true)
    }

    pub fn active_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.alerts.find_active_alerts()?)
    }

    pub fn statistics(&self) -> Result<EngineStats> {
        let rules = self.rules.list_rules()?;
        let active = self.alerts.find_active_alerts()?;
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();

        Ok(EngineStats {
            total_rules: rules.len() as u64,
            enabled_rules: rules.iter().filter(|r| r.enabled).count() as u64,
            active_alerts: active.len() as u64,
            critical_alerts: active
                .iter()
                .filter(|a| a.severity == Severity::Critical)
                .count() as u64,
            alerts_today: self.alerts.count_triggered_since(midnight)?,
        })
    }

    /// Deletes resolved alerts older than `days`. Active and acknowledged
    /// alerts are never auto-deleted, whatever their age.
    pub fn cleanup_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let removed = self.alerts.delete_resolved_before(cutoff)?;
        if removed > 0 {
            tracing::info!(removed, days, "Old resolved alerts cleaned up");
        }
        Ok(removed)
    }
}
