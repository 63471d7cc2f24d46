use std::time::Duration;

use chrono_tz::Tz;

use crate::error::Error;
use crate::models::schedule::ScheduleAnchor;

/// Runtime knobs of the retention and summarization pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub retention_hours: u32,
    pub timezone: Tz,
    pub anchors: Vec<ScheduleAnchor>,
    pub calls_per_minute: u32,
    pub cache_capacity: usize,
    pub cleanup_interval: Duration,
    pub daily_quota: u32,
    /// Newest messages per channel that reach the model prompt.
    pub max_messages_per_channel: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retention_hours: 168,
            timezone: chrono_tz::Asia::Tokyo,
            anchors: ScheduleAnchor::default_schedule(),
            calls_per_minute: 60,
            cache_capacity: 100,
            cleanup_interval: Duration::from_secs(6 * 3600),
            daily_quota: 1500,
            max_messages_per_channel: 50,
        }
    }
}

impl PipelineConfig {
    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.retention_hours == 0 {
            return Err(Error::Config("retention must be at least one hour".into()));
        }
        if self.calls_per_minute == 0 {
            return Err(Error::Config("calls per minute must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache capacity must be positive".into()));
        }
        if self.max_messages_per_channel == 0 {
            return Err(Error::Config("messages per channel must be positive".into()));
        }
        for anchor in &self.anchors {
            anchor.validate()?;
            if anchor.lookback_hours > self.retention_hours {
                return Err(Error::Config(format!(
                    "anchor '{}' looks back {}h but retention is only {}h",
                    anchor.label, anchor.lookback_hours, self.retention_hours
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn lookback_beyond_retention_is_rejected() {
        let config = PipelineConfig {
            retention_hours: 24,
            ..PipelineConfig::default()
        };
        // the weekly roll-up needs 168h
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_prompt_cap_is_rejected() {
        let config = PipelineConfig {
            max_messages_per_channel: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
