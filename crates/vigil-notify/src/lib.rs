//! Notification fan-out with pluggable channel support.
//!
//! Newly triggered alerts are routed by the
//! [`dispatcher::NotificationDispatcher`] to one or more
//! [`NotificationChannel`] implementations, with per-recipient filtering
//! and channel-specific message templates. Built-in channels: email
//! (SMTP), webhook, and an in-app feed for the host dashboard.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod plugin;
pub mod template;


use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use vigil_common::types::{NotificationRecipient, Priority};

/// A delivery channel for rendered alert notifications.
///
/// Implementations are created by the matching [`plugin::ChannelPlugin`]
/// and registered into the dispatcher's channel map at construction time.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers one message to one recipient.
    ///
    /// Returns `Ok(false)` when the recipient cannot be addressed on this
    /// channel (e.g. no email address configured) — that is a skip, not a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails after retries (if applicable).
    async fn send(
        &self,
        recipient: &NotificationRecipient,
        subject: &str,
        body: &str,
        priority: Priority,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> Result<bool>;

    /// Returns the channel type name (e.g., `"email"`, `"in_app"`).
    fn channel_type(&self) -> &str;
}
