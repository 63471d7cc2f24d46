// tests/retention_tests.rs

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use digestbot_common::models::{Message, PipelineConfig};
use digestbot_common::{Clock, ManualClock};
use digestbot_core::services::{Ingest, MessageService};
use digestbot_core::test_utils::{inbound, test_context, ScriptedGenerator};
use digestbot_core::Error;

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
}

#[tokio::test]
async fn eviction_leaves_only_messages_inside_the_horizon() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let ctx = test_context(&clock, PipelineConfig::default(), Arc::new(ScriptedGenerator::replying("ok")))?;
    let now = clock.now();

    // ages spread over 0..50h, appended out of age order
    for i in 0..60i64 {
        let age = Duration::minutes((i * 7 * 60 + i * 13) % (50 * 60));
        let channel = (i % 3) as u64;
        ctx.buffer.append(
            1,
            channel,
            Message::from_incoming(&inbound(1, channel, &format!("c{channel}"), "alice", &format!("m{i}"), now - age)),
        );
    }

    let horizon = Duration::hours(24);
    ctx.buffer.evict_expired(horizon);

    for channel in 0..3u64 {
        let kept = ctx.buffer.recent(1, channel, usize::MAX);
        assert!(kept.iter().all(|m| now - m.timestamp <= horizon));
        assert!(kept.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
    let window = ctx.buffer.messages_in_window(1, Duration::hours(48));
    let total: usize = window.values().map(|v| v.len()).sum();
    assert_eq!(total, ctx.buffer.len());
    Ok(())
}

#[tokio::test]
async fn window_preserves_append_order_per_channel() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let ctx = test_context(&clock, PipelineConfig::default(), Arc::new(ScriptedGenerator::replying("ok")))?;
    let messages = MessageService::new(ctx.clone());
    messages.on_server_joined(1, "guild");

    for i in 0..20 {
        clock.advance(Duration::seconds(30));
        let (channel, name) = if i % 2 == 0 { (10, "general") } else { (11, "dev") };
        let outcome = messages.on_message(&inbound(1, channel, name, "bob", &i.to_string(), clock.now()));
        assert_eq!(outcome, Ingest::Buffered);
    }

    let window = ctx.buffer.messages_in_window(1, Duration::hours(1));
    for msgs in window.values() {
        let seq: Vec<u32> = msgs.iter().map(|m| m.content.parse().unwrap()).collect();
        assert!(seq.windows(2).all(|w| w[0] < w[1]), "out of order: {seq:?}");
        assert_eq!(seq.len(), 10);
    }
    Ok(())
}

#[tokio::test]
async fn five_messages_survive_a_day_then_expire() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let config = PipelineConfig {
        retention_hours: 24,
        anchors: vec![],
        ..PipelineConfig::default()
    };
    let ctx = test_context(&clock, config, Arc::new(ScriptedGenerator::replying("ok")))?;
    let messages = MessageService::new(ctx.clone());
    messages.on_server_joined(1, "guild");

    for i in 0..5 {
        let (channel, name) = if i < 3 { (10, "general") } else { (11, "random") };
        messages.on_message(&inbound(1, channel, name, "carol", "hello there", clock.now()));
        clock.advance(Duration::minutes(2));
    }
    assert_eq!(clock.now() - start(), Duration::minutes(10));

    ctx.buffer.evict_expired(ctx.retention_horizon());
    assert_eq!(ctx.buffer.len(), 5);

    clock.advance(Duration::hours(25));
    ctx.buffer.evict_expired(ctx.retention_horizon());
    assert_eq!(ctx.buffer.len(), 0);
    assert!(ctx.buffer.channel_counts(1).is_empty());
    Ok(())
}

#[tokio::test]
async fn bots_output_channel_and_unmonitored_channels_are_not_buffered() -> Result<(), Error> {
    let clock = ManualClock::new(start());
    let ctx = test_context(&clock, PipelineConfig::default(), Arc::new(ScriptedGenerator::replying("ok")))?;
    let messages = MessageService::new(ctx.clone());
    messages.on_server_joined(1, "guild");
    ctx.servers.set_summary_channel(1, Some(99))?;

    let mut bot = inbound(1, 10, "general", "helper-bot", "beep", clock.now());
    bot.author_is_bot = true;
    assert_eq!(messages.on_message(&bot), Ingest::BotAuthor);

    let mut dm = inbound(1, 10, "dm", "dave", "psst", clock.now());
    dm.server_id = None;
    assert_eq!(messages.on_message(&dm), Ingest::DirectMessage);

    assert_eq!(
        messages.on_message(&inbound(1, 99, "summaries", "dave", "nice digest", clock.now())),
        Ingest::OutputChannel
    );
    assert_eq!(
        messages.on_message(&inbound(1, 10, "general", "dave", "!status", clock.now())),
        Ingest::Command
    );

    ctx.servers.add_monitored(1, 10)?;
    assert_eq!(
        messages.on_message(&inbound(1, 11, "random", "dave", "off topic", clock.now())),
        Ingest::NotMonitored
    );
    assert_eq!(
        messages.on_message(&inbound(1, 10, "general", "dave", "on topic", clock.now())),
        Ingest::Buffered
    );
    assert_eq!(ctx.buffer.len(), 1);
    Ok(())
}
