//! Outbound email / SMS notifications.
//!
//! Delivery is best effort: callers go through [`deliver`], which logs and
//! counts a failure but never returns it, so a lost message cannot roll back
//! the operation that triggered it.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::config::NotifierSettings;
use crate::error::AppError;
use crate::metrics::NOTIFICATION_FAILED;

pub mod brevo;
pub mod templates;

pub use brevo::BrevoNotifier;

/// Where a message goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Email { address: String, name: String },
    Phone(String),
}

impl Recipient {
    pub fn email(address: impl Into<String>, name: impl Into<String>) -> Self {
        Recipient::Email {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Address with the local part masked, for logs
    pub fn redacted(&self) -> String {
        let raw = match self {
            Recipient::Email { address, .. } => address,
            Recipient::Phone(number) => number,
        };
        let prefix: String = raw.chars().take(3).collect();
        format!("{prefix}***")
    }
}

/// Message delivery backend
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), AppError> {
        // bodies carry codes and reset links
        tracing::info!(to = %to.redacted(), subject, "notification (log only)");
        tracing::debug!(to = %to.redacted(), body, "notification body");
        Ok(())
    }
}

/// Build the notifier selected in settings
pub fn build_notifier(settings: &NotifierSettings) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match settings {
        NotifierSettings::Log => Arc::new(LogNotifier),
        NotifierSettings::Brevo {
            api_key,
            sender_email,
            sender_name,
            sms_sender,
            api_base,
        } => Arc::new(BrevoNotifier::new(
            api_base,
            api_key.clone(),
            sender_email.clone(),
            sender_name.clone(),
            sms_sender.clone(),
            Duration::from_secs(10),
        )?),
    };
    tracing::info!(notifier = notifier.name(), "notifier ready");
    Ok(notifier)
}

/// Send and swallow failures. Returns whether the message went out.
pub async fn deliver(notifier: &dyn Notifier, to: &Recipient, subject: &str, body: &str) -> bool {
    match notifier.send(to, subject, body).await {
        Ok(()) => true,
        Err(e) => {
            counter!(NOTIFICATION_FAILED, "notifier" => notifier.name()).increment(1);
            tracing::warn!(to = %to.redacted(), error = %e, "notification not delivered");
            false
        },
    }
}
