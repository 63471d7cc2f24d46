use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::platform_traits::{HasAuthor, HasChannel, HasTimestamp, IncomingMessage};

pub type ServerId = u64;
pub type ChannelId = u64;

/// Messages grouped by channel name, each list in arrival order.
pub type ChannelMessages = BTreeMap<String, Vec<Arc<Message>>>;

/// One captured chat post. Shared as `Arc<Message>` once buffered and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Link back to the original post (a jump URL on Discord).
    pub origin_ref: String,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub attachment_count: u32,
    pub embed_count: u32,
}

impl Message {
    pub fn from_incoming(msg: &dyn IncomingMessage) -> Self {
        Self {
            author: msg.author_display_name().to_string(),
            content: msg.content().to_string(),
            timestamp: msg.timestamp(),
            origin_ref: msg.origin_ref(),
            channel_id: msg.channel_id(),
            channel_name: msg.channel_name().to_string(),
            attachment_count: msg.attachment_count(),
            embed_count: msg.embed_count(),
        }
    }
}

/// Plain inbound message as handed over by a platform adapter.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub server_id: Option<ServerId>,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub author: String,
    pub author_is_bot: bool,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub attachment_count: u32,
    pub embed_count: u32,
    pub origin_ref: String,
}

impl HasChannel for InboundMessage {
    fn server_id(&self) -> Option<ServerId> {
        self.server_id
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn channel_name(&self) -> &str {
        &self.channel_name
    }
}

impl HasAuthor for InboundMessage {
    fn author_display_name(&self) -> &str {
        &self.author
    }

    fn is_bot_author(&self) -> bool {
        self.author_is_bot
    }
}

impl HasTimestamp for InboundMessage {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl IncomingMessage for InboundMessage {
    fn content(&self) -> &str {
        &self.content
    }

    fn attachment_count(&self) -> u32 {
        self.attachment_count
    }

    fn embed_count(&self) -> u32 {
        self.embed_count
    }

    fn origin_ref(&self) -> String {
        self.origin_ref.clone()
    }
}
