// tests/pipeline_tests.rs

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tokio::time::Instant;

use digestbot_common::models::{PipelineConfig, SummaryMode};
use digestbot_common::{Clock, ManualClock};
use digestbot_core::services::{MessageService, SummaryService};
use digestbot_core::test_utils::{inbound, test_context, RecordingDelivery, ScriptedGenerator};
use digestbot_core::Error;

fn setup(
    config: PipelineConfig,
    generator: Arc<ScriptedGenerator>,
) -> Result<(ManualClock, Arc<SummaryService>, MessageService), Error> {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 3, 0, 0).unwrap());
    let ctx = test_context(&clock, config, generator)?;
    let messages = MessageService::new(ctx.clone());
    messages.on_server_joined(1, "guild");
    let service = Arc::new(SummaryService::new(ctx, Arc::new(RecordingDelivery::default())));
    Ok((clock, service, messages))
}

#[tokio::test]
async fn manual_lookback_is_clamped_to_retention() -> Result<(), Error> {
    let config = PipelineConfig {
        retention_hours: 48,
        anchors: vec![],
        ..PipelineConfig::default()
    };
    let (clock, service, messages) = setup(config, Arc::new(ScriptedGenerator::replying("- talk")))?;
    messages.on_message(&inbound(1, 10, "general", "gina", "still here", clock.now() - Duration::minutes(30)));

    let long = service.summarize_recent(1, Some(1000), false).await.expect("artifact");
    assert_eq!(long.label, "Last 48h");

    let short = service.summarize_recent(1, Some(0), false).await.expect("artifact");
    assert_eq!(short.label, "Last 1h");
    assert_eq!(short.total_messages, 1);

    let default = service.summarize_recent(1, None, true).await.expect("artifact");
    assert_eq!(default.label, "Last 24h");
    assert_eq!(default.mode, SummaryMode::Weekly);
    Ok(())
}

#[tokio::test]
async fn manual_summary_of_unknown_server_or_empty_window_is_none() -> Result<(), Error> {
    let generator = Arc::new(ScriptedGenerator::replying("- talk"));
    let (_clock, service, _messages) = setup(PipelineConfig::default(), generator.clone())?;

    assert!(service.summarize_recent(1, None, false).await.is_none());
    assert!(service.summarize_recent(42, None, false).await.is_none());
    assert_eq!(generator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn model_failure_falls_back_to_keywords_deterministically() -> Result<(), Error> {
    let generator = Arc::new(ScriptedGenerator::failing("quota exhausted"));
    let (clock, service, messages) = setup(PipelineConfig::default(), generator.clone())?;
    for (i, text) in ["deploy pipeline broken", "deploy pipeline fixed", "deploy again tomorrow"]
        .iter()
        .enumerate()
    {
        messages.on_message(&inbound(1, 10, "ops", "hank", text, clock.now() - Duration::minutes(10 - i as i64)));
    }

    let first = service.summarize_recent(1, Some(2), false).await.expect("artifact");
    let second = service.summarize_recent(1, Some(2), false).await.expect("artifact");
    assert_eq!(first.summary, second.summary);
    assert!(first.summary.starts_with("Frequent keywords: deploy, pipeline"), "{}", first.summary);
    // failures are never cached
    assert_eq!(generator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn identical_windows_hit_the_cache() -> Result<(), Error> {
    let generator = Arc::new(ScriptedGenerator::replying("- cached"));
    let (clock, service, messages) = setup(PipelineConfig::default(), generator.clone())?;
    messages.on_message(&inbound(1, 10, "general", "ivy", "same words", clock.now() - Duration::minutes(1)));

    for _ in 0..3 {
        let artifact = service.summarize_recent(1, Some(2), false).await.expect("artifact");
        assert_eq!(artifact.summary, "- cached");
    }
    assert_eq!(generator.calls(), 1);
    assert_eq!(service.context().cache.len(), 1);

    // the detailed mode is a different cache entry
    service.summarize_recent(1, Some(2), true).await.expect("artifact");
    assert_eq!(generator.calls(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn calls_beyond_the_minute_budget_wait_for_the_window() -> Result<(), Error> {
    let config = PipelineConfig {
        calls_per_minute: 2,
        ..PipelineConfig::default()
    };
    let generator = Arc::new(ScriptedGenerator::replying("- ok"));
    let (clock, service, messages) = setup(config, generator.clone())?;

    let started = Instant::now();
    for i in 0..3 {
        // a fresh message each round so every window misses the cache
        messages.on_message(&inbound(1, 10, "general", "jo", &format!("note {i}"), clock.now() - Duration::minutes(5)));
        service.summarize_recent(1, Some(1), false).await.expect("artifact");
    }

    assert_eq!(generator.calls(), 3);
    assert!(started.elapsed() >= std::time::Duration::from_secs(60));
    Ok(())
}

#[tokio::test]
async fn prompt_cap_leaves_statistics_over_the_whole_window() -> Result<(), Error> {
    let config = PipelineConfig {
        max_messages_per_channel: 3,
        ..PipelineConfig::default()
    };
    let generator = Arc::new(ScriptedGenerator::replying("- long thread"));
    let (clock, service, messages) = setup(config, generator.clone())?;
    for i in 0..8 {
        let at = clock.now() - Duration::minutes(60 - i);
        messages.on_message(&inbound(1, 10, "general", "hana", &format!("point {i}"), at));
    }

    let artifact = service.summarize_recent(1, None, false).await.expect("artifact");
    assert_eq!(artifact.total_messages, 8);
    assert_eq!(artifact.top_authors[0].count, 8);

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("hana: point 5"));
    assert!(!prompt.contains("hana: point 4"));
    Ok(())
}
