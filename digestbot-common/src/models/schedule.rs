use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::summary::SummaryMode;

/// A wall-clock time at which a scheduled summary fires.
///
/// Hours and minutes are read in the reference time zone the scheduler is
/// configured with, never in the host's local zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleAnchor {
    pub trigger_hour: u32,
    pub trigger_minute: u32,
    pub lookback_hours: u32,
    pub label: String,
    #[serde(default)]
    pub is_weekly: bool,
    #[serde(default)]
    pub weekday: Option<Weekday>,
}

impl ScheduleAnchor {
    pub fn daily(hour: u32, minute: u32, lookback_hours: u32, label: impl Into<String>) -> Self {
        Self {
            trigger_hour: hour,
            trigger_minute: minute,
            lookback_hours,
            label: label.into(),
            is_weekly: false,
            weekday: None,
        }
    }

    pub fn weekly(
        weekday: Weekday,
        hour: u32,
        minute: u32,
        lookback_hours: u32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            trigger_hour: hour,
            trigger_minute: minute,
            lookback_hours,
            label: label.into(),
            is_weekly: true,
            weekday: Some(weekday),
        }
    }

    /// Morning and evening digests plus the Monday roll-up.
    pub fn default_schedule() -> Vec<ScheduleAnchor> {
        vec![
            ScheduleAnchor::daily(9, 0, 24, "Morning digest"),
            ScheduleAnchor::daily(21, 0, 12, "Evening digest"),
            ScheduleAnchor::weekly(Weekday::Mon, 9, 0, 168, "Weekly roll-up"),
        ]
    }

    pub fn mode(&self) -> SummaryMode {
        if self.is_weekly {
            SummaryMode::Weekly
        } else {
            SummaryMode::Standard
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.trigger_hour > 23 || self.trigger_minute > 59 {
            return Err(Error::Config(format!(
                "anchor '{}' has invalid time {:02}:{:02}",
                self.label, self.trigger_hour, self.trigger_minute
            )));
        }
        if self.lookback_hours == 0 {
            return Err(Error::Config(format!(
                "anchor '{}' must look back at least one hour",
                self.label
            )));
        }
        if self.is_weekly && self.weekday.is_none() {
            return Err(Error::Config(format!(
                "weekly anchor '{}' needs a weekday",
                self.label
            )));
        }
        Ok(())
    }

    /// Exact minute match; weekly anchors additionally gate on the weekday.
    pub fn matches<Tz: TimeZone>(&self, local: &DateTime<Tz>) -> bool {
        if local.hour() != self.trigger_hour || local.minute() != self.trigger_minute {
            return false;
        }
        if self.is_weekly {
            return self.weekday == Some(local.weekday());
        }
        true
    }
}
