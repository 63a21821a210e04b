//! Brevo transactional email and SMS.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Notifier, Recipient};
use crate::error::AppError;

#[derive(Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailPayload<'a> {
    sender: Contact<'a>,
    to: [Contact<'a>; 1],
    subject: &'a str,
    text_content: &'a str,
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    sender: &'a str,
    recipient: &'a str,
    content: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

pub struct BrevoNotifier {
    client: Client,
    api_base: String,
    api_key: String,
    sender_email: String,
    sender_name: Option<String>,
    sms_sender: String,
}

impl BrevoNotifier {
    pub fn new(
        api_base: &str,
        api_key: String,
        sender_email: String,
        sender_name: Option<String>,
        sms_sender: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            sender_email,
            sender_name,
            sms_sender,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<(), AppError> {
        let resp = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .header("api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = resp.text().await.unwrap_or_default();
            Err(AppError::Notification(format!("brevo responded {status}: {detail}")))
        }
    }
}

#[async_trait]
impl Notifier for BrevoNotifier {
    fn name(&self) -> &'static str {
        "brevo"
    }

    async fn send(&self, to: &Recipient, subject: &str, body: &str) -> Result<(), AppError> {
        match to {
            Recipient::Email { address, name } => {
                let payload = EmailPayload {
                    sender: Contact {
                        email: &self.sender_email,
                        name: self.sender_name.as_deref(),
                    },
                    to: [Contact {
                        email: address,
                        name: (!name.is_empty()).then_some(name.as_str()),
                    }],
                    subject,
                    text_content: body,
                };
                self.post("/smtp/email", &payload).await
            },
            Recipient::Phone(number) => {
                // Brevo wants the international number without the leading '+'
                let payload = SmsPayload {
                    sender: &self.sms_sender,
                    recipient: number.trim_start_matches('+'),
                    content: body,
                    kind: "transactional",
                };
                self.post("/transactionalSMS/sms", &payload).await
            },
        }
    }
}
