use std::collections::HashMap;
use vigil_common::types::{Alert, AlertRule};

/// Subject/body template pair with `{{placeholder}}` substitution.
///
/// Recognized placeholders: `{{rule_name}}`, `{{metric}}`, `{{value}}`,
/// `{{threshold}}`, `{{condition}}`, `{{severity}}`, `{{status}}`,
/// `{{message}}`, `{{triggered_at}}`, `{{channels}}`.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn render(&self, alert: &Alert, rule: &AlertRule) -> (String, String) {
        (fill(&self.subject, alert, rule), fill(&self.body, alert, rule))
    }
}

fn fill(template: &str, alert: &Alert, rule: &AlertRule) -> String {
    template
        .replace("{{rule_name}}", &alert.rule_name)
        .replace("{{metric}}", &alert.metric_name)
        .replace("{{value}}", &format!("{:.2}", alert.metric_value))
        .replace("{{threshold}}", &format!("{:.2}", alert.threshold_value))
        .replace("{{condition}}", alert.condition.describe())
        .replace("{{severity}}", &alert.severity.to_string())
        .replace("{{status}}", &alert.status.to_string())
        .replace("{{message}}", &alert.message)
        .replace("{{triggered_at}}", &alert.triggered_at.to_rfc3339())
        .replace("{{channels}}", &rule.notification_channels.join(", "))
}

/// Per-channel templates keyed by channel name, with a fallback for
/// channels that have no specific template configured.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: HashMap<String, MessageTemplate>,
    fallback: MessageTemplate,
}

impl TemplateSet {
    pub fn set(&mut self, channel: &str, template: MessageTemplate) {
        self.templates.insert(channel.to_string(), template);
    }

    pub fn get(&self, channel: &str) -> &MessageTemplate {
        self.templates.get(channel).unwrap_or(&self.fallback)
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "email".to_string(),
            MessageTemplate::new(
                "[vigil][{{severity}}] {{rule_name}} - {{metric}}",
                "Alert: {{severity}}\nRule: {{rule_name}}\nMetric: {{metric}}\nValue: {{value}}\nThreshold: {{threshold}} ({{condition}})\nMessage: {{message}}\nTime: {{triggered_at}}",
            ),
        );
        templates.insert(
            "webhook".to_string(),
            MessageTemplate::new(
                "[vigil][{{severity}}] {{rule_name}}",
                r#"{"rule":"{{rule_name}}","metric":"{{metric}}","value":{{value}},"threshold":{{threshold}},"severity":"{{severity}}","status":"{{status}}","message":"{{message}}","triggered_at":"{{triggered_at}}"}"#,
            ),
        );
        templates.insert(
            "in_app".to_string(),
            MessageTemplate::new("{{rule_name}}", "{{message}}"),
        );
        Self {
            templates,
            fallback: MessageTemplate::new("[vigil][{{severity}}] {{rule_name}}", "{{message}}"),
        }
    }
}
