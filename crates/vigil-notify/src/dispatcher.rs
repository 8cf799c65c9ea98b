use crate::template::{MessageTemplate, TemplateSet};
use crate::NotificationChannel;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing;
use vigil_common::types::{Alert, AlertRule, NotificationRecipient, Priority, Severity};

/// One entry of the bounded dispatch log.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchRecord {
    pub channel: String,
    pub recipient_count: usize,
    pub dispatched_at: DateTime<Utc>,
    pub severity: Severity,
    pub metric_name: String,
}

/// Summary derived from the dispatch log.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DispatchStats {
    pub total_dispatches: u64,
    pub by_channel: HashMap<String, u64>,
}

/// Routes newly triggered alerts to their rule's channels.
///
/// Channels are registered into the name→channel map before the dispatcher
/// is shared; recipients can be added and removed at runtime. Delivery
/// failures are logged per channel/recipient and never abort the remaining
/// deliveries — the alert that triggered the dispatch has already been
/// persisted and is never rolled back from here.
pub struct NotificationDispatcher {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    templates: TemplateSet,
    recipients: RwLock<Vec<NotificationRecipient>>,
    history: Mutex<VecDeque<DispatchRecord>>,
    history_cap: usize,
}

impl NotificationDispatcher {
    pub fn new(history_cap: usize) -> Self {
        Self {
            channels: HashMap::new(),
            templates: TemplateSet::default(),
            recipients: RwLock::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            history_cap,
        }
    }

    /// Registers a channel under its `channel_type()` name.
    pub fn register_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        self.channels
            .insert(channel.channel_type().to_string(), channel);
    }

    /// Overrides the message template for one channel.
    pub fn set_template(&mut self, channel: &str, template: MessageTemplate) {
        self.templates.set(channel, template);
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.keys().map(|s| s.as_str()).collect()
    }

    pub fn add_recipient(&self, recipient: NotificationRecipient) {
        self.recipients
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(recipient);
    }

    /// Removes a recipient by id. Returns true if found.
    pub fn remove_recipient(&self, id: &str) -> bool {
        let mut recipients = self.recipients.write().unwrap_or_else(|p| p.into_inner());
        let before = recipients.len();
        recipients.retain(|r| r.id != id);
        recipients.len() < before
    }

    pub fn recipients(&self) -> Vec<NotificationRecipient> {
        self.recipients
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Fans one alert out across the rule's channels.
    ///
    /// Unknown channel names are logged and skipped. Each resolved channel
    /// delivers on its own task; all tasks are awaited before the dispatch
    /// is recorded in the history log.
    pub async fn dispatch(&self, alert: &Alert, rule: &AlertRule) {
        let priority = Priority::from(alert.severity);
        let mut handles = Vec::new();

        for channel_name in &rule.notification_channels {
            let Some(channel) = self.channels.get(channel_name) else {
                tracing::warn!(
                    channel = %channel_name,
                    rule_id = %rule.id,
                    "Unknown notification channel, skipping"
                );
                continue;
            };

            let (subject, body) = self.templates.get(channel_name).render(alert, rule);

            let targets: Vec<NotificationRecipient> = self
                .recipients
                .read()
                .unwrap_or_else(|p| p.into_inner())
                .iter()
                .filter(|r| r.has_channel(channel_name) && should_notify(r, alert))
                .cloned()
                .collect();

            let mut metadata = HashMap::new();
            metadata.insert("alert_id".to_string(), serde_json::json!(alert.id));
            metadata.insert("rule_id".to_string(), serde_json::json!(rule.id));
            metadata.insert("metric".to_string(), serde_json::json!(alert.metric_name));
            metadata.insert(
                "severity".to_string(),
                serde_json::json!(alert.severity.to_string()),
            );

            let channel = channel.clone();
            let channel_name = channel_name.clone();
            let alert_id = alert.id.clone();
            let severity = alert.severity;
            let metric_name = alert.metric_name.clone();

            // One task per channel; recipients within a channel deliver
            // sequentially.
            handles.push(tokio::spawn(async move {
                let mut delivered = 0usize;
                for recipient in &targets {
                    match channel
                        .send(recipient, &subject, &body, priority, &metadata)
                        .await
                    {
                        Ok(true) => {
                            delivered += 1;
                            tracing::debug!(
                                channel = %channel_name,
                                recipient = %recipient.name,
                                alert_id = %alert_id,
                                "Notification delivered"
                            );
                        }
                        Ok(false) => {
                            tracing::debug!(
                                channel = %channel_name,
                                recipient = %recipient.name,
                                "Recipient not addressable on channel, skipped"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                channel = %channel_name,
                                recipient = %recipient.name,
                                error = %e,
                                "Notification delivery failed"
                            );
                        }
                    }
                }
                DispatchRecord {
                    channel: channel_name,
                    recipient_count: delivered,
                    dispatched_at: Utc::now(),
                    severity,
                    metric_name,
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(record) => self.record(record),
                Err(e) => tracing::error!(error = %e, "Notification task panicked"),
            }
        }
    }

    fn record(&self, record: DispatchRecord) {
        let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.push_back(record);
        while history.len() > self.history_cap {
            history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<DispatchRecord> {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        let mut stats = DispatchStats::default();
        for record in history.iter() {
            stats.total_dispatches += 1;
            *stats.by_channel.entry(record.channel.clone()).or_insert(0) += 1;
        }
        stats
    }
}

/// Recipient-level filter: minimum severity and metric allow-list.
/// Unset filters default to "notify".
pub fn should_notify(recipient: &NotificationRecipient, alert: &Alert) -> bool {
    let Some(filters) = &recipient.filters else {
        return true;
    };

    if let Some(min) = filters.min_severity {
        if alert.severity < min {
            return false;
        }
    }

    if let Some(metrics) = &filters.metrics {
        let matched = metrics
            .iter()
            .any(|m| m == &alert.metric_name || glob_match::glob_match(m, &alert.metric_name));
        if !matched {
            return false;
        }
    }

    true
}
