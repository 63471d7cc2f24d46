use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

use digestbot_common::models::{ChannelId, ServerConfig, ServerId};
pub use digestbot_common::traits::repository_traits::ServerConfigRepository;

use crate::Error;

#[derive(Default)]
pub struct InMemoryServerConfigRepository {
    configs: DashMap<ServerId, ServerConfig>,
}

impl InMemoryServerConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(
        &self,
        server_id: ServerId,
        f: impl FnOnce(&mut ServerConfig) -> T,
    ) -> Result<T, Error> {
        let mut cfg = self
            .configs
            .get_mut(&server_id)
            .ok_or_else(|| Error::NotFound(format!("server {server_id} is not registered")))?;
        Ok(f(cfg.value_mut()))
    }
}

impl ServerConfigRepository for InMemoryServerConfigRepository {
    fn get(&self, server_id: ServerId) -> Option<ServerConfig> {
        self.configs.get(&server_id).map(|cfg| cfg.value().clone())
    }

    fn get_or_create(&self, server_id: ServerId, display_name: &str, now: DateTime<Utc>) -> ServerConfig {
        self.configs
            .entry(server_id)
            .or_insert_with(|| {
                info!("Registering server {} ({})", display_name, server_id);
                ServerConfig::new(server_id, display_name, now)
            })
            .clone()
    }

    fn upsert_joined(&self, server_id: ServerId, display_name: &str, now: DateTime<Utc>) -> ServerConfig {
        let mut cfg = self
            .configs
            .entry(server_id)
            .or_insert_with(|| ServerConfig::new(server_id, display_name, now));
        if cfg.display_name != display_name {
            cfg.display_name = display_name.to_string();
        }
        cfg.clone()
    }

    fn remove(&self, server_id: ServerId) -> Option<ServerConfig> {
        self.configs.remove(&server_id).map(|(_, cfg)| cfg)
    }

    fn list(&self) -> Vec<ServerConfig> {
        let mut all: Vec<ServerConfig> = self.configs.iter().map(|cfg| cfg.value().clone()).collect();
        all.sort_by_key(|cfg| cfg.server_id);
        all
    }

    fn set_summary_channel(&self, server_id: ServerId, channel: Option<ChannelId>) -> Result<ServerConfig, Error> {
        self.update(server_id, |cfg| {
            cfg.summary_channel = channel;
            cfg.clone()
        })
    }

    fn set_enabled(&self, server_id: ServerId, enabled: bool) -> Result<ServerConfig, Error> {
        self.update(server_id, |cfg| {
            cfg.enabled = enabled;
            cfg.clone()
        })
    }

    fn add_monitored(&self, server_id: ServerId, channel: ChannelId) -> Result<bool, Error> {
        self.update(server_id, |cfg| cfg.monitored_channels.insert(channel))
    }

    fn remove_monitored(&self, server_id: ServerId, channel: ChannelId) -> Result<bool, Error> {
        self.update(server_id, |cfg| cfg.monitored_channels.remove(&channel))
    }
}
