use crate::error::{NotifyError, Result as NotifyResult};
use crate::plugin::ChannelPlugin;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing;
use vigil_common::types::{NotificationRecipient, Priority};

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> NotifyResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::InvalidConfig(format!("smtp relay: {e}")))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }

    /// The recipient's address comes from `channel_configs["email"]["address"]`.
    fn address_of(recipient: &NotificationRecipient) -> Option<&str> {
        recipient
            .channel_configs
            .get("email")
            .and_then(|c| c.get("address"))
            .and_then(|a| a.as_str())
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(
        &self,
        recipient: &NotificationRecipient,
        subject: &str,
        body: &str,
        _priority: Priority,
        _metadata: &HashMap<String, Value>,
    ) -> Result<bool> {
        let Some(address) = Self::address_of(recipient) else {
            tracing::debug!(
                recipient = %recipient.name,
                "Recipient has no email address configured"
            );
            return Ok(false);
        };

        let email = Message::builder()
            .from(self.from.parse()?)
            .to(address.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(email).await?;
        Ok(true)
    }

    fn channel_type(&self) -> &str {
        "email"
    }
}

// Plugin

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    username: Option<String>,
    password: Option<String>,
    from: String,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailPlugin;

impl ChannelPlugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> NotifyResult<()> {
        serde_json::from_value::<EmailConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))?;
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> NotifyResult<Arc<dyn NotificationChannel>> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))?;
        let channel = EmailChannel::new(
            &cfg.smtp_host,
            cfg.smtp_port,
            cfg.username.as_deref(),
            cfg.password.as_deref(),
            &cfg.from,
        )?;
        Ok(Arc::new(channel))
    }
}
