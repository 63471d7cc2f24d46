use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::{ChannelId, ServerId};

/// Per-server summarization settings. Lives only as long as the bot is a
/// member of the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_id: ServerId,
    pub display_name: String,
    /// Where summaries are posted. `None` means scheduled summaries skip this server.
    pub summary_channel: Option<ChannelId>,
    pub enabled: bool,
    /// Channels to capture. Empty means every channel.
    pub monitored_channels: BTreeSet<ChannelId>,
    pub joined_at: DateTime<Utc>,
}

impl ServerConfig {
    pub fn new(server_id: ServerId, display_name: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            server_id,
            display_name: display_name.into(),
            summary_channel: None,
            enabled: true,
            monitored_channels: BTreeSet::new(),
            joined_at,
        }
    }

    pub fn is_output_channel(&self, channel_id: ChannelId) -> bool {
        self.summary_channel == Some(channel_id)
    }

    pub fn is_monitored(&self, channel_id: ChannelId) -> bool {
        self.monitored_channels.is_empty() || self.monitored_channels.contains(&channel_id)
    }

    /// Output target for scheduled runs, if the server wants them at all.
    pub fn delivery_target(&self) -> Option<ChannelId> {
        if self.enabled { self.summary_channel } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_monitor_set_captures_everything() {
        let mut cfg = ServerConfig::new(1, "guild", Utc::now());
        assert!(cfg.is_monitored(10));
        assert!(cfg.is_monitored(11));

        cfg.monitored_channels.insert(10);
        assert!(cfg.is_monitored(10));
        assert!(!cfg.is_monitored(11));
    }

    #[test]
    fn delivery_target_requires_enabled_and_channel() {
        let mut cfg = ServerConfig::new(1, "guild", Utc::now());
        assert_eq!(cfg.delivery_target(), None);

        cfg.summary_channel = Some(42);
        assert_eq!(cfg.delivery_target(), Some(42));
        assert!(cfg.is_output_channel(42));

        cfg.enabled = false;
        assert_eq!(cfg.delivery_target(), None);
    }
}
