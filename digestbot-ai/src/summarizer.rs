use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use digestbot_common::error::Error;
use digestbot_common::models::summary::NOTHING_TO_SUMMARIZE;
use digestbot_common::models::{ChannelMessages, SummaryMode, SummaryRequest};
use digestbot_common::traits::{SummaryBackend, TextGenerator};

use crate::cache::{Memoized, SummaryCache};
use crate::fallback::keyword_summary;
use crate::prompt::{build_prompt, truncate_chars, TEMPERATURE};
use crate::rate_limit::{RateLimited, SlidingWindowLimiter};
use crate::usage::UsageTracker;

/// The bottom of the pipeline: formats the prompt and calls the model.
pub struct ModelBackend {
    generator: Arc<dyn TextGenerator>,
    usage: Arc<UsageTracker>,
    max_messages_per_channel: usize,
}

impl ModelBackend {
    pub fn new(generator: Arc<dyn TextGenerator>, usage: Arc<UsageTracker>, max_messages_per_channel: usize) -> Self {
        Self {
            generator,
            usage,
            max_messages_per_channel,
        }
    }
}

#[async_trait]
impl SummaryBackend for ModelBackend {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, Error> {
        let prompt = build_prompt(request, self.max_messages_per_channel);
        self.usage.record_call();
        debug!(
            "Requesting {} summary of {} messages from {}",
            request.mode.as_str(),
            request.message_count(),
            self.generator.name()
        );

        let text = self
            .generator
            .generate(&prompt, request.mode.max_output_tokens(), TEMPERATURE)
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Model("empty summary".into()));
        }
        Ok(truncate_chars(text, request.mode.char_limit()))
    }
}

/// Rate limiting first, then memoization, around the model call.
pub fn build_pipeline(
    generator: Arc<dyn TextGenerator>,
    usage: Arc<UsageTracker>,
    limiter: Arc<SlidingWindowLimiter>,
    cache: Arc<SummaryCache>,
    max_messages_per_channel: usize,
) -> Arc<dyn SummaryBackend> {
    let model = ModelBackend::new(generator, usage, max_messages_per_channel);
    Arc::new(RateLimited::new(Memoized::new(model, cache), limiter))
}

/// Summaries that never fail: model text when the primary path works,
/// keyword frequencies when it does not.
pub struct SummaryFallbackChain {
    primary: Arc<dyn SummaryBackend>,
}

impl SummaryFallbackChain {
    pub fn new(primary: Arc<dyn SummaryBackend>) -> Self {
        Self { primary }
    }

    pub async fn summarize(&self, channels: &ChannelMessages, mode: SummaryMode) -> String {
        let request = SummaryRequest::new(channels.clone(), mode);
        self.summarize_request(&request).await
    }

    pub async fn summarize_request(&self, request: &SummaryRequest) -> String {
        if request.is_empty() {
            return NOTHING_TO_SUMMARIZE.to_string();
        }
        match self.primary.summarize(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Model summary failed, using keyword fallback: {}", e);
                let text = keyword_summary(&request.channels);
                info!("Fallback summary built from {} messages", request.message_count());
                text
            }
        }
    }
}
