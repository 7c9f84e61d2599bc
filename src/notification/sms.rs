use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::TwilioConfig;
use crate::models::Channel;
use crate::notification::NotificationProvider;

const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// SMS channel that only logs what it would send
#[derive(Debug, Default, Clone)]
pub struct LogSmsProvider;

#[async_trait]
impl NotificationProvider for LogSmsProvider {
    // Text messages have no subject line.
    async fn send(&self, destination: &str, message: &str, _subject: Option<&str>) -> Result<bool> {
        info!(to = destination, body = message, "[LOG SMS] Sending text message");
        Ok(true)
    }

    fn channel(&self) -> Channel {
        Channel::Sms
    }
}

/// SMS channel backed by the Twilio Messages API
pub struct TwilioSmsProvider {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSmsProvider {
    pub fn new(config: TwilioConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationProvider for TwilioSmsProvider {
    async fn send(&self, destination: &str, message: &str, _subject: Option<&str>) -> Result<bool> {
        let url = format!(
            "{TWILIO_API_URL}/Accounts/{}/Messages.json",
            self.config.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", destination),
                ("From", self.config.from_number.as_str()),
                ("Body", message),
            ])
            .send()
            .await
            .context("Twilio request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(to = destination, status = status.as_u16(), body = %body, "Twilio rejected message");
            return Ok(false);
        }

        info!(to = destination, "SMS sent");
        Ok(true)
    }

    fn channel(&self) -> Channel {
        Channel::Sms
    }
}
