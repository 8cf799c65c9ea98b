use crate::error::{NotifyError, Result as NotifyResult};
use crate::plugin::ChannelPlugin;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing;
use vigil_common::types::{NotificationRecipient, Priority};

const MAX_ATTEMPTS: u32 = 3;

pub struct WebhookChannel {
    client: reqwest::Client,
    default_url: Option<String>,
}

impl WebhookChannel {
    pub fn new(default_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_url,
        }
    }

    /// Per-recipient URL from `channel_configs["webhook"]["url"]`, falling
    /// back to the channel-level default.
    fn url_for<'a>(&'a self, recipient: &'a NotificationRecipient) -> Option<&'a str> {
        recipient
            .channel_configs
            .get("webhook")
            .and_then(|c| c.get("url"))
            .and_then(|u| u.as_str())
            .or(self.default_url.as_deref())
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(
        &self,
        recipient: &NotificationRecipient,
        _subject: &str,
        body: &str,
        priority: Priority,
        _metadata: &HashMap<String, Value>,
    ) -> Result<bool> {
        let Some(url) = self.url_for(recipient) else {
            tracing::debug!(
                recipient = %recipient.name,
                "Recipient has no webhook URL configured"
            );
            return Ok(false);
        };

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .header("X-Vigil-Priority", priority.to_string())
                .body(body.to_string())
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(true),
                Ok(resp) => {
                    let status = resp.status();
                    tracing::warn!(
                        attempt = attempt + 1,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(anyhow::anyhow!("HTTP {status}"));
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                    .await;
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("webhook delivery failed")))
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    default_url: Option<String>,
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> NotifyResult<()> {
        serde_json::from_value::<WebhookConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> NotifyResult<Arc<dyn NotificationChannel>> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        Ok(Arc::new(WebhookChannel::new(cfg.default_url)))
    }
}
