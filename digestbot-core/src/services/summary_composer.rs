use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use digestbot_ai::SummaryFallbackChain;
use digestbot_common::models::{
    ActivityCount, ChannelMessages, Highlight, SummaryArtifact, SummaryMode, SummaryRequest,
};
use digestbot_common::Clock;

pub const TOP_AUTHOR_COUNT: usize = 3;
pub const HIGHLIGHT_COUNT: usize = 5;
pub const EXCERPT_CHARS: usize = 50;

/// Builds the deliverable artifact for one window of messages.
pub struct SummaryComposer {
    summarizer: Arc<SummaryFallbackChain>,
    clock: Arc<dyn Clock>,
}

impl SummaryComposer {
    pub fn new(summarizer: Arc<SummaryFallbackChain>, clock: Arc<dyn Clock>) -> Self {
        Self { summarizer, clock }
    }

    pub async fn compose(
        &self,
        server_name: &str,
        channels: &ChannelMessages,
        label: &str,
        mode: SummaryMode,
    ) -> SummaryArtifact {
        let request = SummaryRequest::new(channels.clone(), mode);
        let summary = self.summarizer.summarize_request(&request).await;

        let all = channels.values().flatten();
        let window_start = all.clone().map(|m| m.timestamp).min();
        let window_end = all.clone().map(|m| m.timestamp).max();
        let unique_authors = all.map(|m| m.author.as_str()).collect::<HashSet<_>>().len();

        SummaryArtifact {
            server_name: server_name.to_string(),
            label: label.to_string(),
            mode,
            total_messages: request.message_count(),
            active_channels: channels.values().filter(|m| !m.is_empty()).count(),
            unique_authors,
            top_channels: top_channels(channels, mode.top_channel_count()),
            top_authors: top_authors(channels, TOP_AUTHOR_COUNT),
            highlights: highlights(channels, HIGHLIGHT_COUNT),
            summary,
            window_start,
            window_end,
            generated_at: self.clock.now(),
        }
    }
}

fn rank(mut counts: Vec<ActivityCount>, k: usize) -> Vec<ActivityCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts.truncate(k);
    counts
}

pub fn top_channels(channels: &ChannelMessages, k: usize) -> Vec<ActivityCount> {
    let counts = channels
        .iter()
        .filter(|(_, msgs)| !msgs.is_empty())
        .map(|(name, msgs)| ActivityCount { name: name.clone(), count: msgs.len() })
        .collect();
    rank(counts, k)
}

pub fn top_authors(channels: &ChannelMessages, k: usize) -> Vec<ActivityCount> {
    let mut by_author: HashMap<&str, usize> = HashMap::new();
    for msg in channels.values().flatten() {
        *by_author.entry(msg.author.as_str()).or_insert(0) += 1;
    }
    let counts = by_author
        .into_iter()
        .map(|(name, count)| ActivityCount { name: name.to_string(), count })
        .collect();
    rank(counts, k)
}

/// The `k` newest messages across all channels, oldest first.
pub fn highlights(channels: &ChannelMessages, k: usize) -> Vec<Highlight> {
    let mut all: Vec<_> = channels.values().flatten().collect();
    all.sort_by_key(|m| m.timestamp);
    let skip = all.len().saturating_sub(k);
    all.into_iter()
        .skip(skip)
        .map(|m| Highlight {
            author: m.author.clone(),
            excerpt: excerpt(&m.content, EXCERPT_CHARS),
            attachment_count: m.attachment_count,
            origin_ref: m.origin_ref.clone(),
        })
        .collect()
}

pub fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_marks_cut_text() {
        assert_eq!(excerpt("short", 50), "short");
        let long = "あ".repeat(60);
        let cut = excerpt(&long, 50);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 53);
    }
}
