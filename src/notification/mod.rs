pub mod email;
pub mod message;
pub mod sms;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

pub use email::{LogEmailProvider, SmtpEmailProvider};
pub use message::AlertMessage;
pub use sms::{LogSmsProvider, TwilioSmsProvider};

use crate::config::Config;
use crate::models::{Channel, UserContact};

/// One delivery channel
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Deliver `message` to `destination`. Channels without a subject line
    /// ignore `subject`.
    async fn send(&self, destination: &str, message: &str, subject: Option<&str>) -> Result<bool>;

    fn channel(&self) -> Channel;
}

/// Routes a message to every channel a recipient has opted into.
///
/// Channels are attempted independently: an error on one is recorded as a
/// failed delivery and never stops the others.
#[derive(Clone, Default)]
pub struct NotificationGateway {
    providers: HashMap<Channel, Arc<dyn NotificationProvider>>,
}

impl NotificationGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for its channel, replacing any previous one
    pub fn with_provider(mut self, provider: Arc<dyn NotificationProvider>) -> Self {
        info!(channel = %provider.channel(), "Registered notification provider");
        self.providers.insert(provider.channel(), provider);
        self
    }

    /// SMTP and Twilio when configured, log-only channels otherwise
    pub fn from_config(config: &Config) -> Result<Self> {
        let email: Arc<dyn NotificationProvider> = match &config.email {
            Some(smtp) => Arc::new(SmtpEmailProvider::new(smtp)?),
            None => {
                warn!("SMTP not configured, email alerts will only be logged");
                Arc::new(LogEmailProvider)
            }
        };
        let sms: Arc<dyn NotificationProvider> = match &config.sms {
            Some(twilio) => Arc::new(TwilioSmsProvider::new(twilio.clone())?),
            None => {
                warn!("Twilio not configured, SMS alerts will only be logged");
                Arc::new(LogSmsProvider)
            }
        };
        Ok(Self::new().with_provider(email).with_provider(sms))
    }

    /// Send to each enabled channel that has a destination on file.
    ///
    /// The returned map only holds attempted channels; a missing provider
    /// counts as a failed attempt.
    pub async fn dispatch(
        &self,
        recipient: &UserContact,
        message: &str,
        subject: Option<&str>,
    ) -> BTreeMap<Channel, bool> {
        let mut results = BTreeMap::new();

        for channel in Channel::ALL {
            if !recipient.preferences.is_enabled(channel) {
                info!(user_id = %recipient.id, %channel, "Channel disabled for user, skipping");
                continue;
            }
            let Some(destination) = recipient.destination(channel) else {
                info!(user_id = %recipient.id, %channel, "No destination on file, skipping");
                continue;
            };

            let delivered = match self.providers.get(&channel) {
                Some(provider) => match provider.send(destination, message, subject).await {
                    Ok(delivered) => delivered,
                    Err(e) => {
                        error!(user_id = %recipient.id, %channel, "Notification failed: {:#}", e);
                        false
                    }
                },
                None => {
                    error!(%channel, "No provider registered for channel");
                    false
                }
            };

            if delivered {
                info!(user_id = %recipient.id, %channel, "Notification delivered");
            } else {
                warn!(user_id = %recipient.id, %channel, "Notification not delivered");
            }
            results.insert(channel, delivered);
        }

        results
    }
}
