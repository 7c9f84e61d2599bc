//! Defaults shared by the configuration layer and the scan pipeline.

// Watch limits
pub const MAX_ACTIVE_WATCHES_PER_USER: usize = 5;

// Notification settings
pub const NOTIFICATION_COOLDOWN_HOURS: i64 = 24;

// Scheduler settings
pub const SCHEDULER_CHECK_INTERVAL_SECONDS: u64 = 60;

// Scan frequency settings
/// Hour of day (UTC) at which daily watches are scanned.
pub const DAILY_SCAN_HOUR: u32 = 12;
pub const HOURLY_SCAN_INTERVAL_HOURS: i64 = 1;
pub const SNIPER_SCAN_INTERVAL_MINUTES: i64 = 5;

// Provider settings
pub const PROVIDER_TIMEOUT_SECONDS: u64 = 300;
pub const MAX_POLL_ATTEMPTS: u32 = 30;
pub const POLL_INTERVAL_SECONDS: u64 = 2;
pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const DETECTION_MAX_RESULTS: usize = 50;

// Mock provider settings
pub const MOCK_API_DELAY_MS: u64 = 1500;
pub const MOCK_MIN_PROPERTIES: usize = 8;
pub const MOCK_MAX_PROPERTIES: usize = 15;

pub const AIRBNB_BASE_URL: &str = "https://www.airbnb.com";
pub const APIFY_API_URL: &str = "https://api.apify.com/v2";
pub const APIFY_ACTOR_ID: &str = "dtrungtin/airbnb-scraper";
pub const DEFAULT_DATA_FILE: &str = "bnb-alerts.json";
