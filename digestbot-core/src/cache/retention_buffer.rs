// File: digestbot-core/src/cache/retention_buffer.rs

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use digestbot_common::models::{ChannelId, Message, ServerId};
use digestbot_common::Clock;

/// Messages of a single channel, oldest first.
#[derive(Debug, Default)]
pub struct ChannelLog {
    pub(crate) name: String,
    pub(crate) messages: VecDeque<Arc<Message>>,
}

impl ChannelLog {
    fn push(&mut self, msg: Arc<Message>) {
        // Arrival order is chronological in practice; a late timestamp is
        // slotted in so the log stays sorted for the window search.
        match self.messages.back() {
            Some(last) if last.timestamp > msg.timestamp => {
                let at = self.messages.partition_point(|m| m.timestamp <= msg.timestamp);
                self.messages.insert(at, msg);
            }
            _ => self.messages.push_back(msg),
        }
    }

    /// Pops expired entries from the head and reports how many went.
    fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some(head) = self.messages.front() {
            if head.timestamp >= cutoff {
                break;
            }
            self.messages.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Time-windowed store of every buffered message, keyed by
/// `(server, channel)`. Each key lives in one dashmap shard, so a shard
/// guard covers a whole channel log for both writers and readers.
pub struct RetentionBuffer {
    pub(crate) logs: DashMap<(ServerId, ChannelId), ChannelLog>,
    clock: Arc<dyn Clock>,
}

impl RetentionBuffer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            logs: DashMap::new(),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn append(&self, server_id: ServerId, channel_id: ChannelId, message: Message) -> Arc<Message> {
        let message = Arc::new(message);
        let mut log = self.logs.entry((server_id, channel_id)).or_default();
        if log.name != message.channel_name {
            log.name = message.channel_name.clone();
        }
        log.push(message.clone());
        message
    }

    /// Drops every message older than `horizon` and every key left empty.
    /// Returns the number of messages removed.
    pub fn evict_expired(&self, horizon: Duration) -> usize {
        let cutoff = self.clock.now() - horizon;
        let mut removed = 0;
        self.logs.retain(|_, log| {
            removed += log.evict_before(cutoff);
            !log.is_empty()
        });
        if removed > 0 {
            debug!("Evicted {} messages older than {}", removed, cutoff);
        }
        removed
    }

    /// Forgets everything buffered for a server. Returns the number of
    /// channel logs dropped.
    pub fn remove_server(&self, server_id: ServerId) -> usize {
        let before = self.logs.len();
        self.logs.retain(|(server, _), _| *server != server_id);
        before.saturating_sub(self.logs.len())
    }

    pub fn remove_channel(&self, server_id: ServerId, channel_id: ChannelId) -> bool {
        self.logs.remove(&(server_id, channel_id)).is_some()
    }

    /// The newest `limit` messages of one channel, oldest first.
    pub fn recent(&self, server_id: ServerId, channel_id: ChannelId, limit: usize) -> Vec<Arc<Message>> {
        match self.logs.get(&(server_id, channel_id)) {
            Some(log) => {
                let skip = log.messages.len().saturating_sub(limit);
                log.messages.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// `(channel name, buffered count)` for each channel of a server, by name.
    pub fn channel_counts(&self, server_id: ServerId) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .logs
            .iter()
            .filter(|entry| entry.key().0 == server_id)
            .map(|entry| (entry.name.clone(), entry.len()))
            .collect();
        counts.sort();
        counts
    }

    pub fn has_server(&self, server_id: ServerId) -> bool {
        self.logs.iter().any(|entry| entry.key().0 == server_id)
    }

    /// Total messages across all servers.
    pub fn len(&self) -> usize {
        self.logs.iter().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use digestbot_common::ManualClock;

    fn msg(channel: &str, at: DateTime<Utc>, content: &str) -> Message {
        Message {
            author: "alice".into(),
            content: content.into(),
            timestamp: at,
            origin_ref: String::new(),
            channel_id: 0,
            channel_name: channel.into(),
            attachment_count: 0,
            embed_count: 0,
        }
    }

    fn setup() -> (ManualClock, RetentionBuffer) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap());
        let buffer = RetentionBuffer::new(Arc::new(clock.clone()));
        (clock, buffer)
    }

    #[test]
    fn late_timestamps_keep_the_log_sorted() {
        let (clock, buffer) = setup();
        let now = clock.now();
        buffer.append(1, 10, msg("general", now, "b"));
        buffer.append(1, 10, msg("general", now - Duration::seconds(5), "a"));
        buffer.append(1, 10, msg("general", now + Duration::seconds(5), "c"));

        let order: Vec<_> = buffer.recent(1, 10, 10).iter().map(|m| m.content.clone()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn eviction_drops_old_heads_and_empty_keys() {
        let (clock, buffer) = setup();
        let now = clock.now();
        buffer.append(1, 10, msg("general", now - Duration::hours(30), "old"));
        buffer.append(1, 10, msg("general", now - Duration::hours(1), "fresh"));
        buffer.append(1, 11, msg("random", now - Duration::hours(26), "stale"));

        assert_eq!(buffer.evict_expired(Duration::hours(24)), 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.channel_counts(1), vec![("general".to_string(), 1)]);
    }

    #[test]
    fn message_exactly_at_horizon_is_kept() {
        let (clock, buffer) = setup();
        buffer.append(1, 10, msg("general", clock.now() - Duration::hours(24), "edge"));
        assert_eq!(buffer.evict_expired(Duration::hours(24)), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let (clock, buffer) = setup();
        let now = clock.now();
        for i in 0..5 {
            buffer.append(1, 10, msg("general", now + Duration::seconds(i), &i.to_string()));
        }
        let tail: Vec<_> = buffer.recent(1, 10, 2).iter().map(|m| m.content.clone()).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert!(buffer.recent(1, 99, 5).is_empty());
    }

    #[test]
    fn remove_server_leaves_other_servers_alone() {
        let (clock, buffer) = setup();
        let now = clock.now();
        buffer.append(1, 10, msg("general", now, "x"));
        buffer.append(1, 11, msg("random", now, "y"));
        buffer.append(2, 20, msg("general", now, "z"));

        assert_eq!(buffer.remove_server(1), 2);
        assert!(!buffer.has_server(1));
        assert!(buffer.has_server(2));
    }
}
