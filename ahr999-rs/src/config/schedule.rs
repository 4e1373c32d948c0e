//! Daily trigger configuration

use crate::error::{DcaError, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;

/// Wall-clock instant the daily run fires at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Local time of day
    pub at: NaiveTime,
    /// Zone the local time is interpreted in
    pub timezone: Tz,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            at: NaiveTime::MIN,
            timezone: chrono_tz::Asia::Shanghai,
        }
    }
}

impl ScheduleConfig {
    /// Parse "HH:MM" and an IANA zone name (e.g. "Asia/Shanghai")
    pub fn parse(time: &str, timezone: &str) -> Result<Self> {
        let at = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|e| DcaError::Config(format!("invalid schedule time '{}': {}", time, e)))?;
        let timezone = timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| DcaError::Config(format!("invalid timezone '{}': {}", timezone, e)))?;
        Ok(Self { at, timezone })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schedule() {
        let schedule = ScheduleConfig::parse("08:30", "Europe/London").unwrap();
        assert_eq!(schedule.at, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(schedule.timezone, chrono_tz::Europe::London);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ScheduleConfig::parse("25:00", "UTC").is_err());
        assert!(ScheduleConfig::parse("08:00", "Mars/Olympus").is_err());
    }
}
