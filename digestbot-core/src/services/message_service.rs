use std::sync::Arc;

use tracing::{debug, info};

use digestbot_common::models::{Message, ServerConfig, ServerId};
use digestbot_common::traits::IncomingMessage;

use crate::context::BotContext;
use crate::services::command_service::COMMAND_PREFIX;

/// Why a message was or was not buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Buffered,
    BotAuthor,
    DirectMessage,
    OutputChannel,
    NotMonitored,
    Command,
}

/// Ingests chat messages into the retention buffer and tracks which
/// servers the bot belongs to.
pub struct MessageService {
    ctx: Arc<BotContext>,
}

impl MessageService {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        debug!("MessageService::new() called");
        Self { ctx }
    }

    pub fn on_message(&self, msg: &dyn IncomingMessage) -> Ingest {
        if msg.is_bot_author() {
            return Ingest::BotAuthor;
        }
        let Some(server_id) = msg.server_id() else {
            return Ingest::DirectMessage;
        };

        let cfg = self
            .ctx
            .servers
            .get_or_create(server_id, &format!("server {server_id}"), self.ctx.now());
        if msg.content().trim_start().starts_with(COMMAND_PREFIX) {
            return Ingest::Command;
        }
        if cfg.is_output_channel(msg.channel_id()) {
            return Ingest::OutputChannel;
        }
        if !cfg.is_monitored(msg.channel_id()) {
            return Ingest::NotMonitored;
        }

        self.ctx
            .buffer
            .append(server_id, msg.channel_id(), Message::from_incoming(msg));
        Ingest::Buffered
    }

    pub fn on_server_joined(&self, server_id: ServerId, display_name: &str) -> ServerConfig {
        let cfg = self.ctx.servers.upsert_joined(server_id, display_name, self.ctx.now());
        info!("Joined server {} ({})", cfg.display_name, server_id);
        cfg
    }

    pub fn on_server_left(&self, server_id: ServerId) {
        let cfg = self.ctx.servers.remove(server_id);
        let channels = self.ctx.buffer.remove_server(server_id);
        info!(
            "Left server {} ({}); dropped {} channel buffers",
            cfg.map(|c| c.display_name).unwrap_or_default(),
            server_id,
            channels
        );
    }
}
