//! Keyword-frequency summary used whenever the model path fails.

use std::collections::HashMap;

use digestbot_common::models::ChannelMessages;

pub const KEYWORD_PREFIX: &str = "Frequent keywords: ";
pub const NO_TOPICS: &str = "No particular topics were found.";

/// Words must be longer than this many characters to count.
const MIN_WORD_CHARS: usize = 4;

/// Top 5 words for a single channel, top 3 across several. Ties break
/// alphabetically so the output only depends on the input.
pub fn keyword_summary(channels: &ChannelMessages) -> String {
    let active = channels.values().filter(|m| !m.is_empty()).count();
    let top_n = if active > 1 { 3 } else { 5 };

    let mut counts: HashMap<String, usize> = HashMap::new();
    for msg in channels.values().flatten() {
        for word in msg.content.to_lowercase().split_whitespace() {
            if word.chars().count() > MIN_WORD_CHARS {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    if ranked.is_empty() {
        return NO_TOPICS.to_string();
    }
    let words: Vec<String> = ranked.into_iter().take(top_n).map(|(w, _)| w).collect();
    format!("{}{}", KEYWORD_PREFIX, words.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use digestbot_common::models::Message;
    use std::sync::Arc;

    fn msgs(texts: &[&str]) -> Vec<Arc<Message>> {
        texts
            .iter()
            .map(|t| {
                Arc::new(Message {
                    author: "user".into(),
                    content: t.to_string(),
                    timestamp: Utc::now(),
                    origin_ref: String::new(),
                    channel_id: 1,
                    channel_name: "general".into(),
                    attachment_count: 0,
                    embed_count: 0,
                })
            })
            .collect()
    }

    #[test]
    fn single_channel_reports_top_five() {
        let mut channels = ChannelMessages::new();
        channels.insert(
            "general".into(),
            msgs(&[
                "Release planning meeting tomorrow",
                "release notes draft, release checklist",
                "meeting moved; planning continues",
                "alpha bravo charlie delta",
            ]),
        );
        assert_eq!(
            keyword_summary(&channels),
            "Frequent keywords: release, meeting, planning, alpha, bravo"
        );
    }

    #[test]
    fn multiple_channels_report_top_three() {
        let mut channels = ChannelMessages::new();
        channels.insert("a".into(), msgs(&["rustacean rustacean crabby"]));
        channels.insert("b".into(), msgs(&["crabby ferris ferris ferris"]));
        assert_eq!(
            keyword_summary(&channels),
            "Frequent keywords: ferris, crabby, rustacean"
        );
    }

    #[test]
    fn short_words_only_yield_no_topics() {
        let mut channels = ChannelMessages::new();
        channels.insert("a".into(), msgs(&["ok lol yes", "four word test here"]));
        assert_eq!(keyword_summary(&channels), NO_TOPICS);
    }
}
