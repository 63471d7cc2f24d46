// Daily model-call counter, reset at midnight in the reference zone

use std::sync::Arc;

use chrono::{NaiveDate, Timelike};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::Serialize;

use digestbot_common::Clock;

struct UsageState {
    date: NaiveDate,
    calls: u32,
}

pub struct UsageTracker {
    clock: Arc<dyn Clock>,
    timezone: Tz,
    daily_quota: u32,
    state: Mutex<UsageState>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageSnapshot {
    pub date: NaiveDate,
    pub calls: u32,
    pub quota: u32,
    pub remaining: u32,
    pub percent_used: f64,
    /// Linear projection of today's total from the hours elapsed so far.
    pub projected_calls: Option<u32>,
}

impl UsageTracker {
    pub fn new(clock: Arc<dyn Clock>, timezone: Tz, daily_quota: u32) -> Self {
        let date = clock.now().with_timezone(&timezone).date_naive();
        Self {
            clock,
            timezone,
            daily_quota,
            state: Mutex::new(UsageState { date, calls: 0 }),
        }
    }

    /// Count one attempted model call.
    pub fn record_call(&self) {
        let today = self.clock.now().with_timezone(&self.timezone).date_naive();
        let mut state = self.state.lock();
        if state.date != today {
            state.date = today;
            state.calls = 0;
        }
        state.calls = state.calls.saturating_add(1);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let local = self.clock.now().with_timezone(&self.timezone);
        let today = local.date_naive();
        let calls = {
            let state = self.state.lock();
            if state.date == today { state.calls } else { 0 }
        };

        let percent_used = if self.daily_quota == 0 {
            0.0
        } else {
            calls as f64 / self.daily_quota as f64 * 100.0
        };
        let hours_passed = local.hour();
        let projected_calls = if hours_passed > 0 {
            Some(((calls as f64 / hours_passed as f64) * 24.0) as u32)
        } else {
            None
        };

        UsageSnapshot {
            date: today,
            calls,
            quota: self.daily_quota,
            remaining: self.daily_quota.saturating_sub(calls),
            percent_used,
            projected_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use digestbot_common::ManualClock;

    #[test]
    fn counter_resets_when_the_local_date_changes() {
        // 2025-01-01 12:00 in Tokyo
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let tracker = UsageTracker::new(Arc::new(clock.clone()), chrono_tz::Asia::Tokyo, 1500);

        for _ in 0..6 {
            tracker.record_call();
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.calls, 6);
        assert_eq!(snap.remaining, 1494);
        assert!((snap.percent_used - 0.4).abs() < 1e-9);
        assert_eq!(snap.projected_calls, Some(12));

        // past midnight in Tokyo
        clock.advance(Duration::hours(13));
        assert_eq!(tracker.snapshot().calls, 0);
        tracker.record_call();
        assert_eq!(tracker.snapshot().calls, 1);
    }
}
