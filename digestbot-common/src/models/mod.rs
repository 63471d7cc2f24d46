// File: digestbot-common/src/models/mod.rs
pub mod config;
pub mod message;
pub mod schedule;
pub mod server;
pub mod summary;

pub use config::PipelineConfig;
pub use message::{ChannelId, ChannelMessages, InboundMessage, Message, ServerId};
pub use schedule::ScheduleAnchor;
pub use server::ServerConfig;
pub use summary::{ActivityCount, Highlight, SummaryArtifact, SummaryMode, SummaryRequest};
