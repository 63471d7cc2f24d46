use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info};

use digestbot_common::models::{ScheduleAnchor, ServerConfig, ServerId, SummaryArtifact, SummaryMode};
use digestbot_common::traits::SummaryDelivery;

use crate::context::BotContext;
use crate::services::summary_composer::SummaryComposer;

pub const DEFAULT_MANUAL_HOURS: u32 = 24;

/// Per-anchor tally of what happened to each server.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnchorReport {
    pub delivered: usize,
    pub empty: usize,
    pub unconfigured: usize,
    pub failed: usize,
}

/// Runs summaries for scheduled anchors and manual requests.
pub struct SummaryService {
    ctx: Arc<BotContext>,
    composer: SummaryComposer,
    delivery: Arc<dyn SummaryDelivery>,
}

impl SummaryService {
    pub fn new(ctx: Arc<BotContext>, delivery: Arc<dyn SummaryDelivery>) -> Self {
        let composer = SummaryComposer::new(ctx.summarizer.clone(), ctx.clock.clone());
        Self { ctx, composer, delivery }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.ctx
    }

    /// One anchor across every registered server. A failing server is
    /// logged and counted; the rest still run.
    pub async fn run_anchor(&self, anchor: &ScheduleAnchor) -> AnchorReport {
        let mut report = AnchorReport::default();
        for cfg in self.ctx.servers.list() {
            let Some(target) = cfg.delivery_target() else {
                debug!("'{}': skipping {} (no output channel or disabled)", anchor.label, cfg.display_name);
                report.unconfigured += 1;
                continue;
            };
            let Some(artifact) = self
                .summarize_window(&cfg, anchor.lookback_hours, &anchor.label, anchor.mode())
                .await
            else {
                debug!("'{}': no messages for {} in the last {}h", anchor.label, cfg.display_name, anchor.lookback_hours);
                report.empty += 1;
                continue;
            };

            match self.delivery.deliver(target, &artifact).await {
                Ok(()) => {
                    info!(
                        "'{}': delivered summary of {} messages to {} ({})",
                        anchor.label, artifact.total_messages, cfg.display_name, cfg.server_id
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    error!("'{}': delivery to {} failed: {}", anchor.label, cfg.display_name, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Manual trigger. Bypasses the scheduler, the output channel and the
    /// enabled flag; `hours` is clamped to the retention horizon.
    pub async fn summarize_recent(
        &self,
        server_id: ServerId,
        hours: Option<u32>,
        detailed: bool,
    ) -> Option<SummaryArtifact> {
        let cfg = self.ctx.servers.get(server_id)?;
        let hours = self.ctx.clamp_lookback(hours.unwrap_or(DEFAULT_MANUAL_HOURS));
        let mode = if detailed { SummaryMode::Weekly } else { SummaryMode::Standard };
        let label = format!("Last {hours}h");
        self.summarize_window(&cfg, hours, &label, mode).await
    }

    async fn summarize_window(
        &self,
        cfg: &ServerConfig,
        lookback_hours: u32,
        label: &str,
        mode: SummaryMode,
    ) -> Option<SummaryArtifact> {
        let window = self
            .ctx
            .buffer
            .messages_in_window(cfg.server_id, Duration::hours(lookback_hours as i64));
        if window.is_empty() {
            return None;
        }
        Some(self.composer.compose(&cfg.display_name, &window, label, mode).await)
    }
}
