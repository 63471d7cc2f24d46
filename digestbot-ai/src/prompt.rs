//! Prompt construction for channel summaries.

use digestbot_common::models::{ChannelMessages, Message, SummaryMode, SummaryRequest};

pub const TEMPERATURE: f32 = 0.3;

const STANDARD_INSTRUCTIONS: &str = "\
Analyze the following Discord conversation and write a concise summary.

Cover:
1. Main topics of discussion
2. Decisions or agreements that were reached
3. Questions and their answers
4. Notable information or statements

Keep it short and easy to read, structured as bullet points.";

const WEEKLY_INSTRUCTIONS: &str = "\
You are an expert at analyzing Discord server conversations.
Write a comprehensive roll-up of the past week's conversation below.

Include:
1. **Main topics**: what the conversation centered on
2. **Important information**: key facts or links that were shared
3. **Decisions**: anything that was decided
4. **Action items**: tasks someone should follow up on
5. **Questions**: resolved and still-open questions
6. **Overall mood**: the tone of the conversation

Format the output as structured Markdown.";

/// One transcript line: `author: content [attachments: n] [embeds: n]`.
pub fn format_line(msg: &Message) -> String {
    let mut text = format!("{}: {}", msg.author, msg.content);
    if msg.attachment_count > 0 {
        text.push_str(&format!(" [attachments: {}]", msg.attachment_count));
    }
    if msg.embed_count > 0 {
        text.push_str(&format!(" [embeds: {}]", msg.embed_count));
    }
    text
}

/// Every channel's transcript under a `## #channel` header, keeping only
/// the newest `max_per_channel` lines of each channel.
pub fn format_transcript(channels: &ChannelMessages, max_per_channel: usize) -> String {
    let mut sections = Vec::with_capacity(channels.len());
    for (channel, messages) in channels {
        if messages.is_empty() {
            continue;
        }
        let newest = &messages[messages.len().saturating_sub(max_per_channel)..];
        let lines: Vec<String> = newest.iter().map(|m| format_line(m)).collect();
        sections.push(format!("## #{}\n{}", channel, lines.join("\n")));
    }
    sections.join("\n\n")
}

pub fn build_prompt(request: &SummaryRequest, max_per_channel: usize) -> String {
    let instructions = match request.mode {
        SummaryMode::Standard => STANDARD_INSTRUCTIONS,
        SummaryMode::Weekly => WEEKLY_INSTRUCTIONS,
    };
    format!(
        "{}\n\nConversation ({} channels):\n{}",
        instructions,
        request.channels.values().filter(|m| !m.is_empty()).count(),
        format_transcript(&request.channels, max_per_channel)
    )
}

/// Cuts `text` to at most `limit` characters on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
