use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::ChannelMessages;

/// Returned instead of a summary when there is nothing in the window.
pub const NOTHING_TO_SUMMARIZE: &str = "There are no messages to summarize.";

/// Prompt framing and output budget for one summarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryMode {
    Standard,
    Weekly,
}

impl SummaryMode {
    pub fn max_output_tokens(self) -> u32 {
        match self {
            SummaryMode::Standard => 1500,
            SummaryMode::Weekly => 2000,
        }
    }

    /// Longest summary text the presentation layer accepts
    /// (an embed field for standard, an embed description for weekly).
    pub fn char_limit(self) -> usize {
        match self {
            SummaryMode::Standard => 1024,
            SummaryMode::Weekly => 4096,
        }
    }

    pub fn top_channel_count(self) -> usize {
        match self {
            SummaryMode::Standard => 3,
            SummaryMode::Weekly => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryMode::Standard => "standard",
            SummaryMode::Weekly => "weekly",
        }
    }
}

/// Input of one summarization call.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub channels: ChannelMessages,
    pub mode: SummaryMode,
}

impl SummaryRequest {
    pub fn new(channels: ChannelMessages, mode: SummaryMode) -> Self {
        Self { channels, mode }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(|msgs| msgs.is_empty())
    }

    pub fn message_count(&self) -> usize {
        self.channels.values().map(|msgs| msgs.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub author: String,
    pub excerpt: String,
    pub attachment_count: u32,
    pub origin_ref: String,
}

/// Ready-to-deliver summary of one server's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryArtifact {
    pub server_name: String,
    pub label: String,
    pub mode: SummaryMode,
    pub total_messages: usize,
    pub active_channels: usize,
    pub unique_authors: usize,
    pub top_channels: Vec<ActivityCount>,
    pub top_authors: Vec<ActivityCount>,
    pub highlights: Vec<Highlight>,
    pub summary: String,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}
