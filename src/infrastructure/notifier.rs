use crate::domain::notification::EmailNotification;
use crate::domain::ports::Notifier;
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Notifier that only records the message in the trace output.
///
/// Used when no notification service is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &EmailNotification) -> Result<()> {
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            attachments = notification.attachments.len(),
            "notification dispatched"
        );
        Ok(())
    }
}

pub const EMAIL_ENDPOINT: &str = "/api/v1/notifications/email";

/// Client for the external notification service.
///
/// Posts the notification as JSON with a bearer API key; anything but
/// `200 OK` is a failure.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, EMAIL_ENDPOINT)
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &EmailNotification) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = %status.as_u16(), to = %notification.to, "notification rejected");
            return Err(LoanError::NotificationError(format!(
                "notification service returned status: {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
