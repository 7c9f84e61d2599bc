use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Delivery channel for alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Email, Channel::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel opt-in flags of a recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPreferences {
    #[serde(default = "default_true")]
    pub email_enabled: bool,
    #[serde(default)]
    pub sms_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ChannelPreferences {
    fn default() -> Self {
        Self {
            email_enabled: true,
            sms_enabled: false,
        }
    }
}

impl ChannelPreferences {
    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Sms => self.sms_enabled,
        }
    }
}

/// Contact details the user directory exposes to the scan pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContact {
    pub id: UserId,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub preferences: ChannelPreferences,
}

impl UserContact {
    /// Destination address on file for a channel, ignoring blank values.
    pub fn destination(&self, channel: Channel) -> Option<&str> {
        let address = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Sms => self.phone.as_deref(),
        };
        address.map(str::trim).filter(|a| !a.is_empty())
    }
}
