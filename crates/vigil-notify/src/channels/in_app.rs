use crate::error::{NotifyError, Result as NotifyResult};
use crate::plugin::ChannelPlugin;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use vigil_common::types::{NotificationRecipient, Priority};

/// One message in the in-app feed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InAppMessage {
    pub id: String,
    pub recipient_id: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

/// Delivers notifications into a bounded in-memory feed the host dashboard
/// reads back out. Oldest messages are dropped past the cap.
pub struct InAppChannel {
    max_messages: usize,
    feed: Mutex<VecDeque<InAppMessage>>,
}

impl InAppChannel {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            feed: Mutex::new(VecDeque::new()),
        }
    }

    pub fn messages(&self) -> Vec<InAppMessage> {
        self.feed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn messages_for(&self, recipient_id: &str) -> Vec<InAppMessage> {
        self.feed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|m| m.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.feed.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.feed.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

#[async_trait]
impl NotificationChannel for InAppChannel {
    async fn send(
        &self,
        recipient: &NotificationRecipient,
        subject: &str,
        body: &str,
        priority: Priority,
        _metadata: &HashMap<String, Value>,
    ) -> Result<bool> {
        let mut feed = self.feed.lock().unwrap_or_else(|p| p.into_inner());
        feed.push_back(InAppMessage {
            id: vigil_common::id::next_id(),
            recipient_id: recipient.id.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
            priority,
            created_at: Utc::now(),
        });
        while feed.len() > self.max_messages {
            feed.pop_front();
        }
        Ok(true)
    }

    fn channel_type(&self) -> &str {
        "in_app"
    }
}

// Plugin

#[derive(Deserialize)]
struct InAppConfig {
    #[serde(default = "default_max_messages")]
    max_messages: usize,
}

fn default_max_messages() -> usize {
    500
}

pub struct InAppPlugin;

impl ChannelPlugin for InAppPlugin {
    fn name(&self) -> &str {
        "in_app"
    }

    fn validate_config(&self, config: &Value) -> NotifyResult<()> {
        serde_json::from_value::<InAppConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("in_app: {e}")))?;
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> NotifyResult<Arc<dyn NotificationChannel>> {
        let cfg: InAppConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("in_app: {e}")))?;
        Ok(Arc::new(InAppChannel::new(cfg.max_messages)))
    }
}
