use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::models::message::{ChannelId, ServerId};
use crate::models::server::ServerConfig;

/// Per-server settings store. Entries exist only while the bot is a
/// member of the server.
pub trait ServerConfigRepository: Send + Sync {
    fn get(&self, server_id: ServerId) -> Option<ServerConfig>;

    /// Returns the existing entry, or creates a default one named `display_name`.
    fn get_or_create(&self, server_id: ServerId, display_name: &str, now: DateTime<Utc>) -> ServerConfig;

    /// Like [`get_or_create`](Self::get_or_create) but also refreshes the display name.
    fn upsert_joined(&self, server_id: ServerId, display_name: &str, now: DateTime<Utc>) -> ServerConfig;

    fn remove(&self, server_id: ServerId) -> Option<ServerConfig>;

    /// All entries, ordered by server id.
    fn list(&self) -> Vec<ServerConfig>;

    fn set_summary_channel(&self, server_id: ServerId, channel: Option<ChannelId>) -> Result<ServerConfig, Error>;

    fn set_enabled(&self, server_id: ServerId, enabled: bool) -> Result<ServerConfig, Error>;

    /// Returns `false` when the channel was already monitored.
    fn add_monitored(&self, server_id: ServerId, channel: ChannelId) -> Result<bool, Error>;

    /// Returns `false` when the channel was not monitored.
    fn remove_monitored(&self, server_id: ServerId, channel: ChannelId) -> Result<bool, Error>;

    fn monitored(&self, server_id: ServerId) -> BTreeSet<ChannelId> {
        self.get(server_id)
            .map(|cfg| cfg.monitored_channels)
            .unwrap_or_default()
    }
}
