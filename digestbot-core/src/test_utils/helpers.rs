// File: digestbot-core/src/test_utils/helpers.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use digestbot_common::models::{ChannelId, InboundMessage, PipelineConfig, ServerId, SummaryArtifact};
use digestbot_common::traits::{SummaryDelivery, TextGenerator};
use digestbot_common::{Clock, ManualClock};

use crate::context::BotContext;
use crate::Error;

/// Wall-clock time that moves with tokio's timer, so paused-time tests
/// drive the scheduler loop and the context clock together.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self { base, started: Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }
}

/// A model stand-in that answers every prompt with the same reply.
pub struct ScriptedGenerator {
    reply: Mutex<Result<String, String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(Ok(text.to_string())),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call sleeps `delay` on the tokio timer before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(reason: &str) -> Self {
        let generator = Self::replying("");
        *generator.reply.lock() = Err(reason.to_string());
        generator
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _max_output_tokens: u32, _temperature: f32) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.lock().clone().map_err(Error::Model)
    }
}

/// Records every delivery; targets listed in `failing` return an error.
#[derive(Default)]
pub struct RecordingDelivery {
    pub delivered: Mutex<Vec<(ChannelId, SummaryArtifact)>>,
    pub failing: Mutex<HashSet<ChannelId>>,
}

impl RecordingDelivery {
    pub fn count(&self) -> usize {
        self.delivered.lock().len()
    }

    pub fn targets(&self) -> Vec<ChannelId> {
        self.delivered.lock().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl SummaryDelivery for RecordingDelivery {
    async fn deliver(&self, target: ChannelId, artifact: &SummaryArtifact) -> Result<(), Error> {
        if self.failing.lock().contains(&target) {
            return Err(Error::Delivery(format!("channel {target} refused the post")));
        }
        self.delivered.lock().push((target, artifact.clone()));
        Ok(())
    }
}

pub fn inbound(
    server_id: ServerId,
    channel_id: ChannelId,
    channel_name: &str,
    author: &str,
    content: &str,
    at: DateTime<Utc>,
) -> InboundMessage {
    InboundMessage {
        server_id: Some(server_id),
        channel_id,
        channel_name: channel_name.to_string(),
        author: author.to_string(),
        author_is_bot: false,
        content: content.to_string(),
        timestamp: at,
        attachment_count: 0,
        embed_count: 0,
        origin_ref: format!("https://discord.com/channels/{server_id}/{channel_id}/{}", at.timestamp_micros()),
    }
}

/// A context on a manual clock with the given pipeline config.
pub fn test_context(
    clock: &ManualClock,
    config: PipelineConfig,
    generator: Arc<dyn TextGenerator>,
) -> Result<Arc<BotContext>, Error> {
    Ok(Arc::new(BotContext::new(config, Arc::new(clock.clone()), generator)?))
}
