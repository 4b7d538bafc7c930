//! Outgoing notifications: digital receipts, consent reminders and
//! operator alerts.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(i64),
    Admin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    DigitalReceipt,
    EulaRequired,
    AdminAlert,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Template::DigitalReceipt => "digital_receipt",
            Template::EulaRequired => "eula_required",
            Template::AdminAlert => "admin_alert",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &Recipient,
        template: Template,
        data: &Value,
    ) -> Result<(), NotifyError>;
}

/// Writes every notification to the log. Used when no transport is set up.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        template: Template,
        data: &Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(recipient = ?recipient, template = %template, data = %data, "notification");
        Ok(())
    }
}

/// Sends and logs failures; notifications are never retried.
pub async fn notify(notifier: &dyn Notifier, recipient: Recipient, template: Template, data: Value) {
    if let Err(e) = notifier.send(&recipient, template, &data).await {
        tracing::warn!(recipient = ?recipient, template = %template, error = %e, "notification not delivered");
    }
}
