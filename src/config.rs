//! Runtime configuration read from the environment (and an optional `.env`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::constants::{
    APIFY_ACTOR_ID, APIFY_API_URL, DAILY_SCAN_HOUR, DEFAULT_DATA_FILE, HOURLY_SCAN_INTERVAL_HOURS,
    MAX_ACTIVE_WATCHES_PER_USER, MAX_POLL_ATTEMPTS, MOCK_API_DELAY_MS, NOTIFICATION_COOLDOWN_HOURS,
    POLL_INTERVAL_SECONDS, PROVIDER_TIMEOUT_SECONDS, SCHEDULER_CHECK_INTERVAL_SECONDS,
    SNIPER_SCAN_INTERVAL_MINUTES,
};
use crate::services::schedule::ScanCadence;

#[derive(Debug, Clone)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub provider: ProviderConfig,
    pub email: Option<SmtpConfig>,
    pub sms: Option<TwilioConfig>,
    pub max_active_watches: usize,
    pub data_file: PathBuf,
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between two scheduler iterations
    pub check_interval: Duration,
    pub cadence: ScanCadence,
    /// Minimum gap between two alerts for the same watch
    pub notification_cooldown: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(SCHEDULER_CHECK_INTERVAL_SECONDS),
            cadence: ScanCadence::default(),
            notification_cooldown: chrono::Duration::hours(NOTIFICATION_COOLDOWN_HOURS),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Mock { delay: Duration },
    Apify(ApifyConfig),
    Browser { settle_time: Duration },
}

#[derive(Debug, Clone)]
pub struct ApifyConfig {
    pub api_token: String,
    pub actor_id: String,
    pub api_url: String,
    /// Overall bound on one search, including polling
    pub timeout: Duration,
    pub max_poll_attempts: u32,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl Config {
    /// Load from the process environment after reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let daily_scan_hour: u32 = env.parse_or("DAILY_SCAN_HOUR", DAILY_SCAN_HOUR)?;
        if daily_scan_hour > 23 {
            bail!("DAILY_SCAN_HOUR must be between 0 and 23, got {daily_scan_hour}");
        }

        let scheduler = SchedulerConfig {
            check_interval: Duration::from_secs(
                env.parse_or("SCHEDULER_CHECK_INTERVAL_SECONDS", SCHEDULER_CHECK_INTERVAL_SECONDS)?,
            ),
            cadence: ScanCadence {
                daily_hour: daily_scan_hour,
                hourly_interval: chrono::Duration::hours(HOURLY_SCAN_INTERVAL_HOURS),
                sniper_interval: chrono::Duration::minutes(SNIPER_SCAN_INTERVAL_MINUTES),
            },
            notification_cooldown: chrono::Duration::hours(
                env.parse_or("NOTIFICATION_COOLDOWN_HOURS", NOTIFICATION_COOLDOWN_HOURS)?,
            ),
        };

        Ok(Self {
            scheduler,
            provider: Self::provider_config(&env)?,
            email: Self::smtp_config(&env)?,
            sms: Self::twilio_config(&env),
            max_active_watches: env
                .parse_or("MAX_ACTIVE_WATCHES_PER_USER", MAX_ACTIVE_WATCHES_PER_USER)?,
            data_file: env
                .get("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            log_json: env
                .get("LOG_FORMAT")
                .is_some_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }

    fn provider_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<ProviderConfig> {
        let token = env.get("APIFY_API_TOKEN").unwrap_or_default();
        let mode = env
            .get("SCRAPER_MODE")
            .map(|mode| mode.to_ascii_lowercase())
            .unwrap_or_else(|| (if token.is_empty() { "mock" } else { "apify" }).to_string());

        match mode.as_str() {
            "mock" => Ok(ProviderConfig::Mock {
                delay: Duration::from_millis(env.parse_or("MOCK_API_DELAY_MS", MOCK_API_DELAY_MS)?),
            }),
            "apify" => {
                if token.is_empty() {
                    bail!("SCRAPER_MODE=apify requires APIFY_API_TOKEN");
                }
                Ok(ProviderConfig::Apify(ApifyConfig {
                    api_token: token,
                    actor_id: env
                        .get("APIFY_ACTOR_ID")
                        .unwrap_or_else(|| APIFY_ACTOR_ID.to_string()),
                    api_url: env
                        .get("APIFY_API_URL")
                        .unwrap_or_else(|| APIFY_API_URL.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    timeout: Duration::from_secs(
                        env.parse_or("PROVIDER_TIMEOUT_SECONDS", PROVIDER_TIMEOUT_SECONDS)?,
                    ),
                    max_poll_attempts: env.parse_or("MAX_POLL_ATTEMPTS", MAX_POLL_ATTEMPTS)?,
                    poll_interval: Duration::from_secs(
                        env.parse_or("POLL_INTERVAL_SECONDS", POLL_INTERVAL_SECONDS)?,
                    ),
                }))
            }
            "browser" => Ok(ProviderConfig::Browser {
                settle_time: Duration::from_secs(env.parse_or("BROWSER_SETTLE_SECONDS", 8u64)?),
            }),
            other => bail!("SCRAPER_MODE must be one of mock, apify, browser (got '{other}')"),
        }
    }

    fn smtp_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Option<SmtpConfig>> {
        let (Some(server), Some(username), Some(password), Some(from_email)) = (
            env.get("SMTP_SERVER"),
            env.get("SMTP_USERNAME"),
            env.get("SMTP_PASSWORD"),
            env.get("FROM_EMAIL"),
        ) else {
            return Ok(None);
        };

        Ok(Some(SmtpConfig {
            server,
            port: env.parse_or("SMTP_PORT", 587u16)?,
            username,
            password,
            from_email,
            from_name: env.get("FROM_NAME").unwrap_or_else(|| "BnB Alerts".to_string()),
        }))
    }

    fn twilio_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Option<TwilioConfig> {
        Some(TwilioConfig {
            account_sid: env.get("TWILIO_ACCOUNT_SID")?,
            auth_token: env.get("TWILIO_AUTH_TOKEN")?,
            from_number: env.get("TWILIO_PHONE_NUMBER")?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Non-blank value of a variable
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid value for {key}: '{raw}'")),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.scheduler.check_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler.cadence.daily_hour, 12);
        assert_eq!(config.scheduler.notification_cooldown, chrono::Duration::hours(24));
        assert_eq!(config.max_active_watches, 5);
        assert!(matches!(config.provider, ProviderConfig::Mock { .. }));
        assert!(config.email.is_none());
        assert!(config.sms.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn apify_token_selects_apify_mode() {
        let config = config_from(&[
            ("APIFY_API_TOKEN", "secret"),
            ("APIFY_API_URL", "https://apify.local/v2/"),
        ])
        .unwrap();
        let ProviderConfig::Apify(apify) = config.provider else {
            panic!("expected apify provider");
        };
        assert_eq!(apify.api_token, "secret");
        assert_eq!(apify.api_url, "https://apify.local/v2");
        assert_eq!(apify.actor_id, "dtrungtin/airbnb-scraper");
        assert_eq!(apify.timeout, Duration::from_secs(300));
    }

    #[test]
    fn explicit_mode_overrides_token() {
        let config = config_from(&[("APIFY_API_TOKEN", "secret"), ("SCRAPER_MODE", "browser")])
            .unwrap();
        assert!(matches!(config.provider, ProviderConfig::Browser { .. }));
    }

    #[test]
    fn apify_mode_without_token_is_rejected() {
        assert!(config_from(&[("SCRAPER_MODE", "apify")]).is_err());
    }

    #[test]
    fn invalid_numbers_fail_fast() {
        assert!(config_from(&[("SCHEDULER_CHECK_INTERVAL_SECONDS", "soon")]).is_err());
        assert!(config_from(&[("DAILY_SCAN_HOUR", "24")]).is_err());
    }

    #[test]
    fn partial_twilio_settings_leave_sms_unconfigured() {
        let config = config_from(&[("TWILIO_ACCOUNT_SID", "AC1"), ("TWILIO_AUTH_TOKEN", "t")]).unwrap();
        assert!(config.sms.is_none());

        let config = config_from(&[
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "t"),
            ("TWILIO_PHONE_NUMBER", "+15550001111"),
        ])
        .unwrap();
        assert_eq!(config.sms.unwrap().from_number, "+15550001111");
    }
}
