use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance used for floating-point equality in condition checks.
pub const FLOAT_EPSILON: f64 = 1e-9;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use vigil_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Delivery priority passed to notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Priority::Low,
            Severity::Medium => Priority::Normal,
            Severity::High => Priority::High,
            Severity::Critical => Priority::Urgent,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Comparison operator attached to an alert rule.
///
/// The operator set is closed: rules are validated against it once at
/// creation time and never re-parse the operator per evaluation.
/// `Eq`/`Ne` compare within [`FLOAT_EPSILON`] to avoid floating-point
/// equality pitfalls.
///
/// # Examples
///
/// ```
/// use vigil_common::types::AlertCondition;
///
/// let cond: AlertCondition = "gt".parse().unwrap();
/// assert!(cond.is_met(80.1, 80.0));
/// assert!(!cond.is_met(80.0, 80.0));
/// assert!(AlertCondition::Eq.is_met(80.0000000001, 80.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl AlertCondition {
    pub fn is_met(&self, current: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Gt => current > threshold,
            AlertCondition::Lt => current < threshold,
            AlertCondition::Ge => current >= threshold,
            AlertCondition::Le => current <= threshold,
            AlertCondition::Eq => (current - threshold).abs() < FLOAT_EPSILON,
            AlertCondition::Ne => (current - threshold).abs() >= FLOAT_EPSILON,
        }
    }

    /// Human wording used when building alert messages.
    pub fn describe(&self) -> &'static str {
        match self {
            AlertCondition::Gt => "above",
            AlertCondition::Lt => "below",
            AlertCondition::Ge => "at or above",
            AlertCondition::Le => "at or below",
            AlertCondition::Eq => "equal to",
            AlertCondition::Ne => "different from",
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::Gt => write!(f, "gt"),
            AlertCondition::Lt => write!(f, "lt"),
            AlertCondition::Ge => write!(f, "ge"),
            AlertCondition::Le => write!(f, "le"),
            AlertCondition::Eq => write!(f, "eq"),
            AlertCondition::Ne => write!(f, "ne"),
        }
    }
}

impl std::str::FromStr for AlertCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gt" | ">" | "greater_than" => Ok(AlertCondition::Gt),
            "lt" | "<" | "less_than" => Ok(AlertCondition::Lt),
            "ge" | ">=" | "greater_equal" => Ok(AlertCondition::Ge),
            "le" | "<=" | "less_equal" => Ok(AlertCondition::Le),
            "eq" | "==" | "equal" => Ok(AlertCondition::Eq),
            "ne" | "!=" | "not_equal" => Ok(AlertCondition::Ne),
            _ => Err(format!("unknown condition operator: {s}")),
        }
    }
}

/// Lifecycle state of an alert.
///
/// `Resolved` and `Expired` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Expired,
}

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Expired)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A configured alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    /// Unique among live rules.
    pub name: String,
    pub description: Option<String>,
    pub metric_name: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub severity: Severity,
    pub enabled: bool,
    /// Minimum minutes between successive alerts for this rule.
    pub cooldown_minutes: u32,
    /// Ordered channel names notifications fan out to.
    pub notification_channels: Vec<String>,
    /// Opaque extension config carried alongside the rule.
    #[serde(default)]
    pub additional_config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating an alert rule.
///
/// The `condition` arrives as a string and is validated against the fixed
/// operator set when the rule is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub metric_name: String,
    pub condition: String,
    pub threshold: f64,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    #[serde(default)]
    pub additional_config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// Partial update for an alert rule.
///
/// Unknown fields are a hard error (`deny_unknown_fields`), not silently
/// dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
    #[serde(default)]
    pub notification_channels: Option<Vec<String>>,
    #[serde(default)]
    pub additional_config: Option<serde_json::Value>,
}

/// One triggering of a rule.
///
/// Everything describing the trigger (`metric_value`, `condition`,
/// `threshold_value`, the rule name/description) is snapshotted at trigger
/// time and stays fixed through later rule edits or deletion. Only the
/// lifecycle fields mutate afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// The originating rule; kept even if the rule is later deleted.
    pub rule_id: Option<String>,
    pub rule_name: String,
    pub rule_description: Option<String>,
    pub metric_name: String,
    pub metric_value: f64,
    pub condition: AlertCondition,
    pub threshold_value: f64,
    pub severity: Severity,
    pub status: AlertStatus,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_by: Option<String>,
}

/// A single observation of a metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-recipient delivery filters. Unset fields mean "notify".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilters {
    /// Alerts below this severity are not delivered to the recipient.
    #[serde(default)]
    pub min_severity: Option<Severity>,
    /// Allowed metric names; entries may be exact names or glob patterns
    /// (e.g. `"disk.*"`).
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
}

/// A notification target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecipient {
    pub id: String,
    pub name: String,
    /// Channel names this recipient accepts.
    pub channels: Vec<String>,
    /// Per-channel address/config, e.g. `{"email": {"address": "a@b.c"}}`.
    #[serde(default)]
    pub channel_configs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub filters: Option<AlertFilters>,
}

impl NotificationRecipient {
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_ordinal() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_to_priority_mapping() {
        assert_eq!(Priority::from(Severity::Low), Priority::Low);
        assert_eq!(Priority::from(Severity::Medium), Priority::Normal);
        assert_eq!(Priority::from(Severity::High), Priority::High);
        assert_eq!(Priority::from(Severity::Critical), Priority::Urgent);
    }

    #[test]
    fn condition_parses_symbols_and_names() {
        assert_eq!(">".parse::<AlertCondition>().unwrap(), AlertCondition::Gt);
        assert_eq!(
            "less_equal".parse::<AlertCondition>().unwrap(),
            AlertCondition::Le
        );
        assert!("between".parse::<AlertCondition>().is_err());
    }

    #[test]
    fn comparison_operators_are_strict() {
        // Values straddling threshold = 80
        assert!(!AlertCondition::Gt.is_met(79.9, 80.0));
        assert!(!AlertCondition::Gt.is_met(80.0, 80.0));
        assert!(AlertCondition::Gt.is_met(80.1, 80.0));

        assert!(AlertCondition::Lt.is_met(79.9, 80.0));
        assert!(!AlertCondition::Lt.is_met(80.0, 80.0));

        assert!(AlertCondition::Ge.is_met(80.0, 80.0));
        assert!(!AlertCondition::Ge.is_met(79.9, 80.0));

        assert!(AlertCondition::Le.is_met(80.0, 80.0));
        assert!(!AlertCondition::Le.is_met(80.1, 80.0));
    }

    #[test]
    fn equality_operators_use_epsilon() {
        assert!(AlertCondition::Eq.is_met(80.0000000001, 80.0));
        assert!(!AlertCondition::Ne.is_met(80.0000000001, 80.0));
        assert!(AlertCondition::Ne.is_met(80.001, 80.0));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!AlertStatus::Active.is_terminal());
        assert!(!AlertStatus::Acknowledged.is_terminal());
        assert!(AlertStatus::Resolved.is_terminal());
        assert!(AlertStatus::Expired.is_terminal());
    }

    #[test]
    fn rule_round_trips_through_json() {
        let rule = AlertRule {
            id: "r-1".into(),
            name: "cpu high".into(),
            description: None,
            metric_name: "cpu.usage".into(),
            condition: AlertCondition::Ge,
            threshold: 92.5,
            severity: Severity::Critical,
            enabled: true,
            cooldown_minutes: 30,
            notification_channels: vec!["email".into(), "in_app".into()],
            additional_config: serde_json::json!({"team": "infra"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&rule).unwrap();
        let back: AlertRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.condition, AlertCondition::Ge);
        assert_eq!(back.threshold, 92.5);
        assert_eq!(back.notification_channels, rule.notification_channels);
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let err = serde_json::from_value::<RulePatch>(serde_json::json!({
            "threshold": 50.0,
            "color": "red"
        }));
        assert!(err.is_err());
    }
}
