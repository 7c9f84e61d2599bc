//! Next-run computation for the frequency tiers.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};

use crate::constants::{DAILY_SCAN_HOUR, HOURLY_SCAN_INTERVAL_HOURS, SNIPER_SCAN_INTERVAL_MINUTES};
use crate::models::Frequency;

/// Cadence parameters of the three frequency tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCadence {
    /// Hour of day (UTC, 0..=23) daily watches are clamped to
    pub daily_hour: u32,
    pub hourly_interval: Duration,
    pub sniper_interval: Duration,
}

impl Default for ScanCadence {
    fn default() -> Self {
        Self {
            daily_hour: DAILY_SCAN_HOUR,
            hourly_interval: Duration::hours(HOURLY_SCAN_INTERVAL_HOURS),
            sniper_interval: Duration::minutes(SNIPER_SCAN_INTERVAL_MINUTES),
        }
    }
}

impl ScanCadence {
    /// When a watch with `frequency` should next be scanned, counting from
    /// `base`.
    ///
    /// * daily: one day later, at `daily_hour`:00:00
    /// * hourly: one interval later, truncated to the hour
    /// * sniper: exactly one interval later
    ///
    /// Unparseable stored frequencies are already read as hourly (see
    /// [`Frequency::from_str_lossy`]), so every watch has a defined cadence.
    pub fn next_scan_at(&self, frequency: Frequency, base: DateTime<Utc>) -> DateTime<Utc> {
        match frequency {
            Frequency::Daily => {
                let next = base + Duration::days(1);
                match NaiveTime::from_hms_opt(self.daily_hour, 0, 0) {
                    Some(at) => Utc.from_utc_datetime(&next.date_naive().and_time(at)),
                    None => next,
                }
            }
            Frequency::Hourly => truncate_to_hour(base + self.hourly_interval),
            Frequency::Sniper => base + self.sniper_interval,
        }
    }
}

fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    match NaiveTime::from_hms_opt(at.hour(), 0, 0) {
        Some(hour) => Utc.from_utc_datetime(&at.date_naive().and_time(hour)),
        None => at,
    }
}
