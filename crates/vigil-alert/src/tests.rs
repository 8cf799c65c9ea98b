use crate::engine::AlertEngine;
use crate::error::AlertError;
use crate::MetricSource;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use vigil_common::types::{AlertStatus, CreateRuleRequest, Severity};
use vigil_store::memory::MemoryStore;
use vigil_store::{AlertStore, RuleStore};

/// Metric source backed by a mutable map.
struct MapSource {
    values: RwLock<HashMap<String, f64>>,
}

impl MapSource {
    fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    fn set(&self, metric: &str, value: f64) {
        self.values
            .write()
            .unwrap()
            .insert(metric.to_string(), value);
    }

    fn clear(&self, metric: &str) {
        self.values.write().unwrap().remove(metric);
    }
}

impl MetricSource for MapSource {
    fn get_value(&self, metric_name: &str) -> Option<f64> {
        if metric_name == "metric.that.panics" {
            panic!("provider bug");
        }
        self.values.read().unwrap().get(metric_name).copied()
    }
}

fn setup() -> (Arc<MemoryStore>, Arc<MapSource>, AlertEngine) {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MapSource::new());
    let engine = AlertEngine::new(
        store.clone() as Arc<dyn RuleStore>,
        store.clone() as Arc<dyn AlertStore>,
        source.clone() as Arc<dyn MetricSource>,
        30,
    );
    (store, source, engine)
}

fn cpu_rule(name: &str, cooldown_minutes: Option<u32>) -> CreateRuleRequest {
    CreateRuleRequest {
        name: name.into(),
        description: Some("cpu watch".into()),
        metric_name: "cpu.usage".into(),
        condition: "gt".into(),
        threshold: 80.0,
        severity: Severity::High,
        enabled: true,
        cooldown_minutes,
        notification_channels: vec!["in_app".into()],
        additional_config: serde_json::Value::Null,
    }
}

#[test]
fn create_rule_rejects_unknown_condition() {
    let (_, _, engine) = setup();
    let mut req = cpu_rule("bad", None);
    req.condition = "between".into();
    assert!(matches!(
        engine.create_rule(req).unwrap_err(),
        AlertError::InvalidCondition(_)
    ));
}

#[test]
fn create_rule_applies_default_cooldown() {
    let (_, _, engine) = setup();
    let rule = engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    assert_eq!(rule.cooldown_minutes, 30);
    let rule2 = engine.create_rule(cpu_rule("cpu higher", Some(5))).unwrap();
    assert_eq!(rule2.cooldown_minutes, 5);
}

#[test]
fn evaluate_triggers_alert_with_snapshot() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 85.5);

    let alerts = engine.evaluate_all().unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.status, AlertStatus::Active);
    assert_eq!(alert.metric_value, 85.5);
    assert_eq!(alert.threshold_value, 80.0);
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.rule_name, "cpu high");
    assert!(alert.message.contains("above"));
}

#[test]
fn condition_not_met_triggers_nothing() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 79.9);
    assert!(engine.evaluate_all().unwrap().is_empty());
}

#[test]
fn cooldown_suppresses_back_to_back_triggers() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", Some(30))).unwrap();
    source.set("cpu.usage", 95.0);

    let first = engine.evaluate_all().unwrap();
    assert_eq!(first.len(), 1);

    // Immediately again: still inside the cooldown window
    assert!(engine.evaluate_all().unwrap().is_empty());

    // Resolving the alert clears the way for a new trigger
    engine.resolve(&first[0].id, "op").unwrap();
    assert_eq!(engine.evaluate_all().unwrap().len(), 1);
}

#[test]
fn acknowledged_alert_still_blocks_retrigger() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", Some(30))).unwrap();
    source.set("cpu.usage", 95.0);

    let first = engine.evaluate_all().unwrap();
    assert!(engine.acknowledge(&first[0].id, "op").unwrap());
    assert!(engine.evaluate_all().unwrap().is_empty());
}

#[test]
fn rules_on_same_metric_cool_down_independently() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", Some(30))).unwrap();
    let mut other = cpu_rule("cpu very high", Some(30));
    other.threshold = 90.0;
    engine.create_rule(other).unwrap();

    source.set("cpu.usage", 95.0);
    assert_eq!(engine.evaluate_all().unwrap().len(), 2);
}

#[test]
fn zero_cooldown_triggers_every_pass() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", Some(0))).unwrap();
    source.set("cpu.usage", 95.0);

    assert_eq!(engine.evaluate_all().unwrap().len(), 1);
    assert_eq!(engine.evaluate_all().unwrap().len(), 1);
}

#[test]
fn disabled_rule_never_triggers() {
    let (_, source, engine) = setup();
    let mut req = cpu_rule("cpu high", None);
    req.enabled = false;
    engine.create_rule(req).unwrap();
    source.set("cpu.usage", 95.0);
    assert!(engine.evaluate_all().unwrap().is_empty());
}

#[test]
fn missing_metric_skips_rule_without_error() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.clear("cpu.usage");
    assert!(engine.evaluate_all().unwrap().is_empty());
}

#[test]
fn panicking_source_does_not_abort_the_pass() {
    let (_, source, engine) = setup();
    let mut bad = cpu_rule("boom", None);
    bad.metric_name = "metric.that.panics".into();
    engine.create_rule(bad).unwrap();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 95.0);

    let alerts = engine.evaluate_all().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_name, "cpu high");
}

#[test]
fn cancelled_pass_evaluates_no_rules() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 95.0);
    assert!(engine.evaluate_until(|| true).unwrap().is_empty());
}

#[test]
fn acknowledge_only_from_active() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 95.0);
    let alert = engine.evaluate_all().unwrap().remove(0);

    assert!(engine.acknowledge(&alert.id, "alice").unwrap());
    // Second acknowledge is a no-op
    assert!(!engine.acknowledge(&alert.id, "bob").unwrap());

    let stored = engine.active_alerts().unwrap();
    assert!(stored.is_empty(), "acknowledged alert is no longer active");
}

#[test]
fn resolve_from_acknowledged_succeeds() {
    let (store, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 95.0);
    let alert = engine.evaluate_all().unwrap().remove(0);

    engine.acknowledge(&alert.id, "alice").unwrap();
    assert!(engine.resolve(&alert.id, "alice").unwrap());

    let stored = store.get_alert(&alert.id).unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Resolved);
    assert!(stored.resolved_at.is_some());
    assert_eq!(stored.resolved_by.as_deref(), Some("alice"));

    // Resolved is terminal
    assert!(!engine.acknowledge(&alert.id, "bob").unwrap());
    assert!(!engine.resolve(&alert.id, "bob").unwrap());
}

#[test]
fn lifecycle_on_unknown_alert_errors() {
    let (_, _, engine) = setup();
    assert!(matches!(
        engine.acknowledge("nope", "op").unwrap_err(),
        AlertError::AlertNotFound(_)
    ));
    assert!(matches!(
        engine.resolve("nope", "op").unwrap_err(),
        AlertError::AlertNotFound(_)
    ));
}

#[test]
fn patch_updates_known_fields() {
    let (_, _, engine) = setup();
    let rule = engine.create_rule(cpu_rule("cpu high", None)).unwrap();

    let updated = engine
        .update_rule(
            &rule.id,
            &serde_json::json!({"threshold": 90.0, "condition": ">=", "enabled": false}),
        )
        .unwrap();
    assert_eq!(updated.threshold, 90.0);
    assert_eq!(
        updated.condition,
        vigil_common::types::AlertCondition::Ge
    );
    assert!(!updated.enabled);
}

#[test]
fn patch_rejects_unknown_fields() {
    let (_, _, engine) = setup();
    let rule = engine.create_rule(cpu_rule("cpu high", None)).unwrap();

    let err = engine
        .update_rule(&rule.id, &serde_json::json!({"colour": "red"}))
        .unwrap_err();
    assert!(matches!(err, AlertError::InvalidField(_)));
}

#[test]
fn patch_revalidates_condition() {
    let (_, _, engine) = setup();
    let rule = engine.create_rule(cpu_rule("cpu high", None)).unwrap();

    let err = engine
        .update_rule(&rule.id, &serde_json::json!({"condition": "within"}))
        .unwrap_err();
    assert!(matches!(err, AlertError::InvalidCondition(_)));
}

#[test]
fn update_of_missing_rule_errors() {
    let (_, _, engine) = setup();
    assert!(matches!(
        engine
            .update_rule("ghost", &serde_json::json!({"threshold": 1.0}))
            .unwrap_err(),
        AlertError::RuleNotFound(_)
    ));
    assert!(matches!(
        engine.delete_rule("ghost").unwrap_err(),
        AlertError::RuleNotFound(_)
    ));
}

#[test]
fn alert_snapshot_survives_rule_edits() {
    let (store, source, engine) = setup();
    let rule = engine.create_rule(cpu_rule("cpu high", None)).unwrap();
    source.set("cpu.usage", 95.0);
    let alert = engine.evaluate_all().unwrap().remove(0);

    engine
        .update_rule(&rule.id, &serde_json::json!({"threshold": 50.0, "name": "renamed"}))
        .unwrap();

    let stored = store.get_alert(&alert.id).unwrap().unwrap();
    assert_eq!(stored.threshold_value, 80.0);
    assert_eq!(stored.rule_name, "cpu high");
}

#[test]
fn statistics_come_from_the_store() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", Some(0))).unwrap();
    let mut critical = cpu_rule("cpu critical", Some(0));
    critical.severity = Severity::Critical;
    critical.threshold = 90.0;
    engine.create_rule(critical).unwrap();
    let mut disabled = cpu_rule("paused", None);
    disabled.enabled = false;
    engine.create_rule(disabled).unwrap();

    source.set("cpu.usage", 95.0);
    engine.evaluate_all().unwrap();

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.total_rules, 3);
    assert_eq!(stats.enabled_rules, 2);
    assert_eq!(stats.active_alerts, 2);
    assert_eq!(stats.critical_alerts, 1);
    assert_eq!(stats.alerts_today, 2);
}

#[test]
fn cleanup_leaves_recent_and_open_alerts() {
    let (_, source, engine) = setup();
    engine.create_rule(cpu_rule("cpu high", Some(0))).unwrap();
    source.set("cpu.usage", 95.0);
    let alert = engine.evaluate_all().unwrap().remove(0);
    engine.resolve(&alert.id, "op").unwrap();

    // Resolved just now: a 7-day cutoff must not remove it
    assert_eq!(engine.cleanup_older_than(7).unwrap(), 0);
}
