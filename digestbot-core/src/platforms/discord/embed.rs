//! Discord embed rendering for summaries and command replies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use twilight_model::channel::message::Embed;
use twilight_model::util::Timestamp;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder};

use digestbot_ai::prompt::truncate_chars;
use digestbot_ai::UsageSnapshot;
use digestbot_common::models::{ActivityCount, Message, SummaryArtifact, SummaryMode};

use crate::services::{StatusReport, SystemReport};

pub const FIELD_LIMIT: usize = 1024;
pub const DESCRIPTION_LIMIT: usize = 4096;
/// Discord rejects embeds whose text adds up to more than this.
pub const EMBED_TOTAL_LIMIT: usize = 6000;
const RECENT_CONTENT_CHARS: usize = 100;

const BLUE: u32 = 0x3498DB;
const PURPLE: u32 = 0x9B59B6;
const GREEN: u32 = 0x2ECC71;

fn timestamp(at: DateTime<Utc>) -> Option<Timestamp> {
    Timestamp::from_micros(at.timestamp_micros()).ok()
}

fn field(name: &str, value: &str, inline: bool) -> EmbedFieldBuilder {
    let value = if value.trim().is_empty() { "-" } else { value };
    let builder = EmbedFieldBuilder::new(name, truncate_chars(value, FIELD_LIMIT));
    if inline { builder.inline() } else { builder }
}

fn ranking(counts: &[ActivityCount], prefix: &str) -> String {
    counts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}{}: {}", i + 1, prefix, c.name, c.count))
        .collect::<Vec<_>>()
        .join("\n")
}

fn embed_len(embed: &Embed) -> usize {
    let count = |s: &Option<String>| s.as_deref().map_or(0, |s| s.chars().count());
    count(&embed.title)
        + count(&embed.description)
        + embed.footer.as_ref().map_or(0, |f| f.text.chars().count())
        + embed
            .fields
            .iter()
            .map(|f| f.name.chars().count() + f.value.chars().count())
            .sum::<usize>()
}

pub fn summary_embed(artifact: &SummaryArtifact) -> Embed {
    let window = match (artifact.window_start, artifact.window_end) {
        (Some(start), Some(end)) => format!("<t:{}:f> to <t:{}:f>", start.timestamp(), end.timestamp()),
        _ => String::new(),
    };
    let stats = format!(
        "Messages: {}\nActive channels: {}\nAuthors: {}",
        artifact.total_messages, artifact.active_channels, artifact.unique_authors
    );

    let mut builder = EmbedBuilder::new()
        .title(format!("📋 {}: {}", artifact.server_name, artifact.label))
        .footer(EmbedFooterBuilder::new(format!("{} summary", artifact.mode.as_str())));

    builder = match artifact.mode {
        SummaryMode::Weekly => builder
            .color(PURPLE)
            .description(truncate_chars(&artifact.summary, DESCRIPTION_LIMIT))
            .field(field("📊 Statistics", &format!("{stats}\n{window}"), false)),
        SummaryMode::Standard => builder
            .color(BLUE)
            .description(window)
            .field(field("📊 Statistics", &stats, false))
            .field(field("🎯 Main topics", &artifact.summary, false)),
    };

    builder = builder
        .field(field("📈 Most active channels", &ranking(&artifact.top_channels, "#"), true))
        .field(field("👥 Active authors", &ranking(&artifact.top_authors, ""), true));
    if let Some(ts) = timestamp(artifact.generated_at) {
        builder = builder.timestamp(ts);
    }

    let mut embed = builder.build();

    let highlights: Vec<String> = artifact
        .highlights
        .iter()
        .map(|h| {
            let mut line = format!("**{}**: {}", h.author, h.excerpt);
            if h.attachment_count > 0 {
                line.push_str(&format!(" 📎({})", h.attachment_count));
            }
            if !h.origin_ref.is_empty() {
                line.push_str(&format!("\n[→ original]({})", h.origin_ref));
            }
            line
        })
        .collect();
    if !highlights.is_empty() {
        let latest = field("💬 Latest messages", &highlights.join("\n\n"), false).build();
        if embed_len(&embed) + latest.name.chars().count() + latest.value.chars().count() <= EMBED_TOTAL_LIMIT {
            embed.fields.push(latest);
        }
    }
    embed
}

pub fn recent_embed(channel_name: &str, messages: &[Arc<Message>], timezone: Tz) -> Embed {
    let mut builder = EmbedBuilder::new()
        .title(format!("Latest {} messages in #{}", messages.len(), channel_name))
        .color(GREEN);
    for msg in messages {
        let local = msg.timestamp.with_timezone(&timezone);
        let mut value = truncate_chars(&msg.content, RECENT_CONTENT_CHARS);
        if msg.content.chars().count() > RECENT_CONTENT_CHARS {
            value.push_str("...");
        }
        if !msg.origin_ref.is_empty() {
            value.push_str(&format!("\n[original]({})", msg.origin_ref));
        }
        builder = builder.field(field(&format!("{} - {}", msg.author, local.format("%H:%M")), &value, false));
    }
    builder.build()
}

pub fn status_embed(report: &StatusReport) -> Embed {
    let output = report
        .summary_channel
        .map(|id| format!("<#{id}>"))
        .unwrap_or_else(|| "not set".to_string());
    let monitored = if report.monitored_channels.is_empty() {
        "all channels".to_string()
    } else {
        report
            .monitored_channels
            .iter()
            .map(|id| format!("<#{id}>"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let buffered = report
        .channel_counts
        .iter()
        .map(|(name, count)| format!("#{name}: {count}"))
        .collect::<Vec<_>>()
        .join("\n");
    let schedule = report
        .anchors
        .iter()
        .map(|a| {
            let day = match (a.is_weekly, a.weekday) {
                (true, Some(wd)) => format!("{wd} "),
                _ => "daily ".to_string(),
            };
            format!("{}{:02}:{:02} {} ({}h)", day, a.trigger_hour, a.trigger_minute, a.label, a.lookback_hours)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let uptime = report.uptime;

    EmbedBuilder::new()
        .title(format!("Bot status: {}", report.server_name))
        .color(BLUE)
        .field(field("Summary channel", &output, true))
        .field(field("Scheduled summaries", if report.enabled { "enabled" } else { "disabled" }, true))
        .field(field("Monitoring", &monitored, false))
        .field(field("Buffered messages", &buffered, false))
        .field(field(&format!("Schedule ({})", report.timezone), &schedule, false))
        .field(field(
            "Runtime",
            &format!(
                "Uptime: {}h {}m\nRetention: {}h\nCached summaries: {} ({} hits, {} misses)\nModel calls this minute: {} / {}",
                uptime.num_hours(),
                uptime.num_minutes() % 60,
                report.retention_hours,
                report.cached_summaries,
                report.cache_hits,
                report.cache_misses,
                report.calls_in_window,
                report.calls_per_minute
            ),
            false,
        ))
        .build()
}

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn system_embed(report: &SystemReport) -> Embed {
    let rss = report
        .process_rss_bytes
        .map(|b| format!("{:.1} MB", b as f64 / BYTES_PER_MB))
        .unwrap_or_else(|| "unknown".to_string());
    EmbedBuilder::new()
        .title("System status")
        .color(GREEN)
        .field(field("CPU", &format!("{:.1}%", report.cpu_percent), true))
        .field(field(
            "Memory",
            &format!(
                "{:.1}% ({:.1} / {:.1} GB)",
                report.memory_percent(),
                report.memory_used_bytes as f64 / BYTES_PER_GB,
                report.memory_total_bytes as f64 / BYTES_PER_GB
            ),
            true,
        ))
        .field(field("Bot process", &rss, true))
        .build()
}

pub fn usage_embed(usage: &UsageSnapshot) -> Embed {
    let projection = usage
        .projected_calls
        .map(|p| format!("{p} calls"))
        .unwrap_or_else(|| "not enough data yet".to_string());
    EmbedBuilder::new()
        .title(format!("Model usage for {}", usage.date))
        .color(if usage.percent_used >= 80.0 { PURPLE } else { GREEN })
        .field(field("Calls today", &format!("{} / {}", usage.calls, usage.quota), true))
        .field(field("Remaining", &usage.remaining.to_string(), true))
        .field(field("Used", &format!("{:.1}%", usage.percent_used), true))
        .field(field("Projected for today", &projection, false))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use digestbot_common::models::Highlight;

    fn artifact(mode: SummaryMode, summary: String) -> SummaryArtifact {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        SummaryArtifact {
            server_name: "guild".into(),
            label: "Morning digest".into(),
            mode,
            total_messages: 5,
            active_channels: 2,
            unique_authors: 2,
            top_channels: vec![ActivityCount { name: "general".into(), count: 3 }],
            top_authors: vec![ActivityCount { name: "alice".into(), count: 4 }],
            highlights: vec![Highlight {
                author: "alice".into(),
                excerpt: "hello".into(),
                attachment_count: 2,
                origin_ref: "https://discord.com/channels/1/2/3".into(),
            }],
            summary,
            window_start: Some(at),
            window_end: Some(at),
            generated_at: at,
        }
    }

    #[test]
    fn standard_summary_goes_in_a_bounded_field() {
        let embed = summary_embed(&artifact(SummaryMode::Standard, "x".repeat(3000)));
        let topics = embed.fields.iter().find(|f| f.name.contains("Main topics")).unwrap();
        assert_eq!(topics.value.chars().count(), FIELD_LIMIT);
        assert!(embed.fields.iter().all(|f| f.value.chars().count() <= FIELD_LIMIT));

        let latest = embed.fields.iter().find(|f| f.name.contains("Latest")).unwrap();
        assert!(latest.value.contains("📎(2)"));
    }

    #[test]
    fn system_embed_reports_gigabytes_and_rss() {
        let embed = system_embed(&SystemReport {
            cpu_percent: 12.5,
            memory_used_bytes: 4 * 1024 * 1024 * 1024,
            memory_total_bytes: 16 * 1024 * 1024 * 1024,
            process_rss_bytes: Some(48 * 1024 * 1024),
        });
        let value = |name: &str| embed.fields.iter().find(|f| f.name == name).map(|f| f.value.clone());
        assert_eq!(value("CPU").as_deref(), Some("12.5%"));
        assert_eq!(value("Memory").as_deref(), Some("25.0% (4.0 / 16.0 GB)"));
        assert_eq!(value("Bot process").as_deref(), Some("48.0 MB"));
    }

    #[test]
    fn weekly_summary_uses_description_and_respects_total() {
        let embed = summary_embed(&artifact(SummaryMode::Weekly, "y".repeat(5000)));
        assert_eq!(embed.description.as_deref().map(|d| d.chars().count()), Some(DESCRIPTION_LIMIT));
        assert!(embed_len(&embed) <= EMBED_TOTAL_LIMIT);
    }
}
