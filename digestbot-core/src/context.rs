// File: digestbot-core/src/context.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use digestbot_ai::{build_pipeline, SlidingWindowLimiter, SummaryCache, SummaryFallbackChain, UsageTracker};
use digestbot_common::models::PipelineConfig;
use digestbot_common::traits::{ServerConfigRepository, TextGenerator};
use digestbot_common::Clock;

use crate::cache::RetentionBuffer;
use crate::repositories::InMemoryServerConfigRepository;
use crate::Error;

/// Everything one bot process shares: the buffer, the server registry and
/// the single summarization pipeline (limiter, cache, usage counter).
/// Tests build as many independent contexts as they like.
pub struct BotContext {
    pub config: PipelineConfig,
    pub clock: Arc<dyn Clock>,
    pub buffer: Arc<RetentionBuffer>,
    pub servers: Arc<dyn ServerConfigRepository>,
    pub summarizer: Arc<SummaryFallbackChain>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub cache: Arc<SummaryCache>,
    pub usage: Arc<UsageTracker>,
    pub started_at: DateTime<Utc>,
}

impl BotContext {
    pub fn new(
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self, Error> {
        config.validate()?;

        let usage = Arc::new(UsageTracker::new(clock.clone(), config.timezone, config.daily_quota));
        let limiter = Arc::new(SlidingWindowLimiter::per_minute(config.calls_per_minute));
        let cache = Arc::new(SummaryCache::new(config.cache_capacity));
        let primary = build_pipeline(
            generator.clone(),
            usage.clone(),
            limiter.clone(),
            cache.clone(),
            config.max_messages_per_channel,
        );

        info!(
            "Summaries via {} ({} calls/min, cache {}), retention {}h, zone {}",
            generator.name(),
            config.calls_per_minute,
            config.cache_capacity,
            config.retention_hours,
            config.timezone
        );

        Ok(Self {
            buffer: Arc::new(RetentionBuffer::new(clock.clone())),
            servers: Arc::new(InMemoryServerConfigRepository::new()),
            summarizer: Arc::new(SummaryFallbackChain::new(primary)),
            limiter,
            cache,
            usage,
            started_at: clock.now(),
            clock,
            config,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn retention_horizon(&self) -> chrono::Duration {
        self.config.retention_horizon()
    }

    /// Manual lookbacks are held to `[1, retention_hours]`.
    pub fn clamp_lookback(&self, hours: u32) -> u32 {
        hours.clamp(1, self.config.retention_hours)
    }
}
