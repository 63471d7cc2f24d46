// digestbot-core/src/tasks/cache_maintenance.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::info;

use crate::cache::RetentionBuffer;

/// Spawns a background task that periodically evicts messages older than
/// `horizon` from the retention buffer.
pub fn spawn_cache_prune_task(
    buffer: Arc<RetentionBuffer>,
    horizon: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let removed = buffer.evict_expired(horizon);
            info!(
                "Buffer cleanup removed {} messages; {} remain",
                removed,
                buffer.len()
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use digestbot_common::models::Message;
    use digestbot_common::{Clock, ManualClock};

    #[tokio::test(start_paused = true)]
    async fn prune_task_evicts_on_its_interval() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap());
        let buffer = Arc::new(RetentionBuffer::new(Arc::new(clock.clone())));
        buffer.append(
            1,
            10,
            Message {
                author: "alice".into(),
                content: "soon stale".into(),
                timestamp: clock.now(),
                origin_ref: String::new(),
                channel_id: 10,
                channel_name: "general".into(),
                attachment_count: 0,
                embed_count: 0,
            },
        );

        let handle = spawn_cache_prune_task(buffer.clone(), chrono::Duration::hours(24), Duration::from_secs(3600));
        clock.advance(chrono::Duration::hours(25));

        sleep(Duration::from_secs(1800)).await;
        assert_eq!(buffer.len(), 1);
        sleep(Duration::from_secs(1801)).await;
        assert_eq!(buffer.len(), 0);
        handle.abort();
    }
}
