use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use digestbot_ai::UsageSnapshot;
use digestbot_common::models::summary::NOTHING_TO_SUMMARIZE;
use digestbot_common::models::{ChannelId, Message, ScheduleAnchor, ServerId, SummaryArtifact};

use crate::context::BotContext;
use crate::services::summary_service::SummaryService;
use crate::services::system_stats::{sample_system, SystemReport};

pub const COMMAND_PREFIX: char = '!';
pub const RECENT_DEFAULT: usize = 10;
pub const RECENT_MAX: usize = 25;

const NEED_ADMIN: &str = "You need administrator permission to use this command.";
const HELP: &str = "Commands: !summary [hours] [detailed], !recent [n], !status, !api_usage, \
!set_summary_channel [#channel], !unset_summary_channel, !enable, !disable, \
!monitor [add|remove] [#channel], !system";

/// Where a command was typed and by whom.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub server_id: ServerId,
    pub channel_id: ChannelId,
    /// As reported by the platform.
    pub is_admin: bool,
}

/// Platform-neutral command output; the runtime decides how to render it.
#[derive(Debug, Clone)]
pub enum CommandResponse {
    Text(String),
    Summary(SummaryArtifact),
    Recent { channel_name: String, messages: Vec<Arc<Message>> },
    Status(StatusReport),
    Usage(UsageSnapshot),
    System(SystemReport),
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub server_name: String,
    pub summary_channel: Option<ChannelId>,
    pub enabled: bool,
    pub monitored_channels: Vec<ChannelId>,
    pub channel_counts: Vec<(String, usize)>,
    pub anchors: Vec<ScheduleAnchor>,
    pub timezone: String,
    pub retention_hours: u32,
    pub uptime: Duration,
    pub cached_summaries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Model calls inside the current rate-limit window.
    pub calls_in_window: usize,
    pub calls_per_minute: usize,
}

/// Accepts `<#123>` mentions and bare ids.
pub fn parse_channel_arg(arg: &str) -> Option<ChannelId> {
    let raw = arg
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(arg);
    raw.parse().ok()
}

pub struct CommandService {
    ctx: Arc<BotContext>,
    summaries: Arc<SummaryService>,
}

impl CommandService {
    pub fn new(ctx: Arc<BotContext>, summaries: Arc<SummaryService>) -> Self {
        debug!("Initializing CommandService");
        Self { ctx, summaries }
    }

    /// `None` when the line is not one of ours.
    pub async fn handle(&self, cmd: &CommandContext, text: &str) -> Option<CommandResponse> {
        let text = text.trim();
        let body = text.strip_prefix(COMMAND_PREFIX)?;
        let mut parts = body.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let args: Vec<&str> = parts.collect();

        debug!("Command '{}' in server {} by admin={}", name, cmd.server_id, cmd.is_admin);
        self.ctx
            .servers
            .get_or_create(cmd.server_id, &format!("server {}", cmd.server_id), self.ctx.now());

        let response = match name.as_str() {
            "summary" => self.summary(cmd, &args).await,
            "recent" => self.recent(cmd, &args),
            "status" => CommandResponse::Status(self.status(cmd.server_id)),
            "api_usage" => CommandResponse::Usage(self.ctx.usage.snapshot()),
            "help" => CommandResponse::Text(HELP.to_string()),
            "set_summary_channel" | "unset_summary_channel" | "enable" | "disable" | "monitor" | "system"
                if !cmd.is_admin =>
            {
                CommandResponse::Text(NEED_ADMIN.to_string())
            }
            "set_summary_channel" => self.set_summary_channel(cmd, &args),
            "unset_summary_channel" => self.text_result(
                self.ctx.servers.set_summary_channel(cmd.server_id, None).map(|_| {
                    "Summary channel cleared; scheduled summaries are paused.".to_string()
                }),
            ),
            "enable" | "disable" => {
                let enabled = name == "enable";
                self.text_result(self.ctx.servers.set_enabled(cmd.server_id, enabled).map(|_| {
                    info!("Scheduled summaries {} for server {}", name, cmd.server_id);
                    format!("Scheduled summaries {}d.", name)
                }))
            }
            "monitor" => self.monitor(cmd, &args),
            "system" => match sample_system().await {
                Ok(report) => CommandResponse::System(report),
                Err(e) => CommandResponse::Text(format!("Could not read system stats: {e}")),
            },
            _ => return None,
        };
        Some(response)
    }

    fn text_result(&self, result: Result<String, crate::Error>) -> CommandResponse {
        match result {
            Ok(text) => CommandResponse::Text(text),
            Err(e) => CommandResponse::Text(format!("Could not update settings: {e}")),
        }
    }

    async fn summary(&self, cmd: &CommandContext, args: &[&str]) -> CommandResponse {
        let mut hours = None;
        let mut detailed = false;
        for arg in args {
            if arg.eq_ignore_ascii_case("detailed") {
                detailed = true;
            } else if let Ok(h) = arg.parse::<u32>() {
                hours = Some(h);
            } else {
                return CommandResponse::Text("Usage: !summary [hours] [detailed]".to_string());
            }
        }

        match self.summaries.summarize_recent(cmd.server_id, hours, detailed).await {
            Some(artifact) => CommandResponse::Summary(artifact),
            None => CommandResponse::Text(NOTHING_TO_SUMMARIZE.to_string()),
        }
    }

    fn recent(&self, cmd: &CommandContext, args: &[&str]) -> CommandResponse {
        let limit = match args.first() {
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => n.clamp(1, RECENT_MAX),
                Err(_) => return CommandResponse::Text("Usage: !recent [n]".to_string()),
            },
            None => RECENT_DEFAULT,
        };

        let monitored = self
            .ctx
            .servers
            .get(cmd.server_id)
            .is_some_and(|cfg| cfg.is_monitored(cmd.channel_id));
        if !monitored {
            return CommandResponse::Text("This channel is not monitored.".to_string());
        }

        let messages = self.ctx.buffer.recent(cmd.server_id, cmd.channel_id, limit);
        match messages.first() {
            Some(first) => CommandResponse::Recent {
                channel_name: first.channel_name.clone(),
                messages,
            },
            None => CommandResponse::Text("No messages to show.".to_string()),
        }
    }

    fn set_summary_channel(&self, cmd: &CommandContext, args: &[&str]) -> CommandResponse {
        let channel = match args.first() {
            Some(arg) => match parse_channel_arg(arg) {
                Some(id) => id,
                None => return CommandResponse::Text("Usage: !set_summary_channel [#channel]".to_string()),
            },
            None => cmd.channel_id,
        };
        self.text_result(
            self.ctx
                .servers
                .set_summary_channel(cmd.server_id, Some(channel))
                .map(|_| format!("Summaries will be posted to <#{channel}>.")),
        )
    }

    fn monitor(&self, cmd: &CommandContext, args: &[&str]) -> CommandResponse {
        let channel = match args.get(1) {
            Some(arg) => parse_channel_arg(arg),
            None => Some(cmd.channel_id),
        };

        match (args.first().copied(), channel) {
            (None, _) => {
                let monitored = self.ctx.servers.monitored(cmd.server_id);
                if monitored.is_empty() {
                    CommandResponse::Text("All channels are monitored.".to_string())
                } else {
                    let list: Vec<String> = monitored.iter().map(|id| format!("<#{id}>")).collect();
                    CommandResponse::Text(format!("Monitored channels: {}", list.join(", ")))
                }
            }
            (Some("add"), Some(channel)) => {
                self.text_result(self.ctx.servers.add_monitored(cmd.server_id, channel).map(|added| {
                    if added {
                        format!("<#{channel}> is now monitored.")
                    } else {
                        format!("<#{channel}> is already monitored.")
                    }
                }))
            }
            (Some("remove"), Some(channel)) => {
                self.text_result(self.ctx.servers.remove_monitored(cmd.server_id, channel).map(|removed| {
                    if removed {
                        self.ctx.buffer.remove_channel(cmd.server_id, channel);
                        format!("<#{channel}> is no longer monitored.")
                    } else {
                        format!("<#{channel}> was not monitored.")
                    }
                }))
            }
            _ => CommandResponse::Text("Usage: !monitor [add|remove] [#channel]".to_string()),
        }
    }

    pub fn status(&self, server_id: ServerId) -> StatusReport {
        let cfg = self.ctx.servers.get(server_id);
        StatusReport {
            server_name: cfg.as_ref().map(|c| c.display_name.clone()).unwrap_or_default(),
            summary_channel: cfg.as_ref().and_then(|c| c.summary_channel),
            enabled: cfg.as_ref().is_some_and(|c| c.enabled),
            monitored_channels: cfg
                .map(|c| c.monitored_channels.into_iter().collect())
                .unwrap_or_default(),
            channel_counts: self.ctx.buffer.channel_counts(server_id),
            anchors: self.ctx.config.anchors.clone(),
            timezone: self.ctx.config.timezone.name().to_string(),
            retention_hours: self.ctx.config.retention_hours,
            uptime: self.ctx.now() - self.ctx.started_at,
            cached_summaries: self.ctx.cache.len(),
            cache_hits: self.ctx.cache.hits(),
            cache_misses: self.ctx.cache.misses(),
            calls_in_window: self.ctx.limiter.calls_in_window(),
            calls_per_minute: self.ctx.limiter.max_calls(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_args_accept_mentions_and_ids() {
        assert_eq!(parse_channel_arg("<#1234>"), Some(1234));
        assert_eq!(parse_channel_arg("5678"), Some(5678));
        assert_eq!(parse_channel_arg("#general"), None);
    }
}
