// digestbot-core/src/tasks/summary_schedule.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use digestbot_common::models::ScheduleAnchor;

use crate::services::summary_service::{AnchorReport, SummaryService};

type FiredKey = (NaiveDate, u32, u32);

/// Oldest missed minute a late tick still evaluates.
pub const MAX_CATCH_UP_MINUTES: i64 = 60;

/// Decides which anchors are due at a given instant. Each anchor fires at
/// most once per local anchor-minute, however often it is ticked.
pub struct ScheduleEngine {
    anchors: Vec<ScheduleAnchor>,
    timezone: Tz,
    last_fired: Mutex<HashMap<usize, FiredKey>>,
    last_evaluated: Mutex<Option<DateTime<Utc>>>,
}

impl ScheduleEngine {
    pub fn new(anchors: Vec<ScheduleAnchor>, timezone: Tz) -> Self {
        Self {
            anchors,
            timezone,
            last_fired: Mutex::new(HashMap::new()),
            last_evaluated: Mutex::new(None),
        }
    }

    pub fn anchors(&self) -> &[ScheduleAnchor] {
        &self.anchors
    }

    /// Anchors matching `now`, marked as fired.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ScheduleAnchor> {
        let local = now.with_timezone(&self.timezone);
        let key = (local.date_naive(), local.hour(), local.minute());

        let mut last_fired = self.last_fired.lock();
        self.anchors
            .iter()
            .enumerate()
            .filter(|(_, anchor)| anchor.matches(&local))
            .filter_map(|(idx, anchor)| {
                if last_fired.get(&idx) == Some(&key) {
                    return None;
                }
                last_fired.insert(idx, key);
                Some(anchor.clone())
            })
            .collect()
    }

    /// Anchors due in any minute since the previous call, up to and
    /// including the minute of `now`. The first call, and any call after
    /// the clock moved backwards, only looks at the current minute.
    pub fn catch_up(&self, now: DateTime<Utc>) -> Vec<ScheduleAnchor> {
        let current = floor_to_minute(now);
        let first = {
            let mut last = self.last_evaluated.lock();
            let first = match *last {
                Some(prev) if prev == current => return Vec::new(),
                Some(prev) if prev < current => prev + Duration::minutes(1),
                _ => current,
            };
            *last = Some(current);
            first
        };

        let missed = (current - first).num_minutes();
        let first = if missed > MAX_CATCH_UP_MINUTES {
            warn!(
                "Scheduler fell {} minutes behind; only the last {} are evaluated",
                missed, MAX_CATCH_UP_MINUTES
            );
            current - Duration::minutes(MAX_CATCH_UP_MINUTES)
        } else {
            first
        };

        let mut fired = Vec::new();
        let mut minute = first;
        while minute <= current {
            fired.extend(self.due(minute));
            minute += Duration::minutes(1);
        }
        fired
    }
}

fn floor_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at - Duration::seconds(at.second() as i64) - Duration::nanoseconds(at.nanosecond() as i64)
}

/// Ticks the engine and runs whatever is due.
pub struct SummaryScheduler {
    engine: ScheduleEngine,
    service: Arc<SummaryService>,
}

impl SummaryScheduler {
    pub fn new(service: Arc<SummaryService>) -> Self {
        let ctx = service.context();
        let engine = ScheduleEngine::new(ctx.config.anchors.clone(), ctx.config.timezone);
        Self { engine, service }
    }

    pub fn engine(&self) -> &ScheduleEngine {
        &self.engine
    }

    /// One scheduler tick at the context clock's current time. Minutes
    /// skipped since the last tick are evaluated too.
    pub async fn tick(&self) -> Vec<(ScheduleAnchor, AnchorReport)> {
        let ctx = self.service.context();
        let mut fired = Vec::new();
        for anchor in self.engine.catch_up(ctx.now()) {
            info!("Anchor '{}' fired ({}h lookback)", anchor.label, anchor.lookback_hours);
            let report = self.service.run_anchor(&anchor).await;
            info!(
                "Anchor '{}' done: {} delivered, {} empty, {} unconfigured, {} failed",
                anchor.label, report.delivered, report.empty, report.unconfigured, report.failed
            );
            if anchor.is_weekly {
                let removed = ctx.buffer.evict_expired(ctx.retention_horizon());
                info!("Post-roll-up cleanup removed {} messages", removed);
            }
            fired.push((anchor, report));
        }
        fired
    }
}

/// How long to sleep so the next tick lands just after a minute boundary.
pub fn until_next_minute(now: DateTime<Utc>) -> StdDuration {
    let into_minute = Duration::seconds(now.second() as i64)
        + Duration::nanoseconds(now.nanosecond().min(999_999_999) as i64);
    let wait = Duration::minutes(1) - into_minute + Duration::seconds(1);
    wait.to_std().unwrap_or(StdDuration::from_secs(1))
}

/// Spawns the once-a-minute scheduler loop. Each tick runs in its own
/// task so a panic inside a tick is logged instead of ending the loop.
pub fn spawn_summary_scheduler(scheduler: Arc<SummaryScheduler>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Summary scheduler started with {} anchors",
            scheduler.engine().anchors().len()
        );
        loop {
            let now = scheduler.service.context().now();
            sleep(until_next_minute(now)).await;

            let tick = scheduler.clone();
            if let Err(e) = tokio::spawn(async move { tick.tick().await }).await {
                error!("Scheduler tick aborted: {}", e);
            }
        }
    })
}
