// File: digestbot-core/src/cache/window.rs

use chrono::Duration;

use digestbot_common::models::{ChannelMessages, ServerId};

use super::retention_buffer::RetentionBuffer;

impl RetentionBuffer {
    /// Messages of one server newer than `now - lookback`, grouped by
    /// channel name, each group oldest first. Channels with nothing in
    /// the window are left out.
    pub fn messages_in_window(&self, server_id: ServerId, lookback: Duration) -> ChannelMessages {
        let cutoff = self.now() - lookback;
        let mut out = ChannelMessages::new();

        for entry in self.logs.iter().filter(|entry| entry.key().0 == server_id) {
            let log = entry.value();
            let start = log.messages.partition_point(|m| m.timestamp <= cutoff);
            if start == log.messages.len() {
                continue;
            }
            let slice = log.messages.range(start..).cloned();
            match out.get_mut(log.name()) {
                // two channels sharing a display name are merged
                Some(existing) => {
                    existing.extend(slice);
                    existing.sort_by_key(|m| m.timestamp);
                }
                None => {
                    out.insert(log.name().to_string(), slice.collect());
                }
            }
        }
        out
    }
}
