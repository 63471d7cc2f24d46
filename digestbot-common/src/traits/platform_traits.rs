//! Narrow views of platform objects. The pipeline only ever sees these,
//! never a concrete gateway type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::models::message::{ChannelId, ServerId};
use crate::models::summary::SummaryArtifact;

pub trait HasAuthor {
    fn author_display_name(&self) -> &str;
    fn is_bot_author(&self) -> bool;
}

pub trait HasTimestamp {
    fn timestamp(&self) -> DateTime<Utc>;
}

pub trait HasChannel {
    /// `None` for direct messages.
    fn server_id(&self) -> Option<ServerId>;
    fn channel_id(&self) -> ChannelId;
    fn channel_name(&self) -> &str;
}

pub trait IncomingMessage: HasAuthor + HasTimestamp + HasChannel + Send + Sync {
    fn content(&self) -> &str;
    fn attachment_count(&self) -> u32;
    fn embed_count(&self) -> u32;
    fn origin_ref(&self) -> String;
}

/// Posts a finished artifact to an output channel.
#[async_trait]
pub trait SummaryDelivery: Send + Sync {
    async fn deliver(&self, target: ChannelId, artifact: &SummaryArtifact) -> Result<(), Error>;
}
