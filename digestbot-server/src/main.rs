use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono_tz::Tz;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use twilight_http::Client as HttpClient;

use digestbot_ai::{GeminiProvider, ProviderConfig};
use digestbot_common::models::{PipelineConfig, ScheduleAnchor};
use digestbot_common::SystemClock;
use digestbot_core::platforms::discord::{DiscordDelivery, DiscordRuntime};
use digestbot_core::services::{CommandService, MessageService, SummaryService};
use digestbot_core::tasks::{spawn_cache_prune_task, spawn_summary_scheduler, SummaryScheduler};
use digestbot_core::BotContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "digestbot")]
#[command(author, version, about = "digestbot - scheduled AI summaries of Discord conversations")]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Google Generative Language API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    #[arg(long, env = "DIGESTBOT_MODEL", default_value = "gemini-1.5-flash")]
    model: String,

    /// IANA zone the schedule anchors are read in
    #[arg(long, env = "DIGESTBOT_TIMEZONE", default_value = "Asia/Tokyo")]
    timezone: String,

    #[arg(long, env = "DIGESTBOT_RETENTION_HOURS", default_value_t = 168)]
    retention_hours: u32,

    #[arg(long, env = "DIGESTBOT_CALLS_PER_MINUTE", default_value_t = 60)]
    calls_per_minute: u32,

    #[arg(long, env = "DIGESTBOT_CACHE_CAPACITY", default_value_t = 100)]
    cache_capacity: usize,

    #[arg(long, env = "DIGESTBOT_CLEANUP_INTERVAL_HOURS", default_value_t = 6)]
    cleanup_interval_hours: u64,

    #[arg(long, env = "DIGESTBOT_DAILY_QUOTA", default_value_t = 1500)]
    daily_quota: u32,

    /// Newest messages per channel included in a model prompt
    #[arg(long, env = "DIGESTBOT_MAX_MESSAGES_PER_SUMMARY", default_value_t = 50)]
    max_messages_per_summary: usize,

    /// JSON array of anchors replacing the default schedule
    #[arg(long, env = "DIGESTBOT_SCHEDULE_FILE")]
    schedule_file: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("digestbot=info"));
    fmt().with_env_filter(filter).init();
}

fn load_schedule(path: &Path) -> anyhow::Result<Vec<ScheduleAnchor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading schedule file {}", path.display()))?;
    let anchors: Vec<ScheduleAnchor> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing schedule file {}", path.display()))?;
    Ok(anchors)
}

fn pipeline_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let timezone: Tz = args
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("unknown time zone '{}': {}", args.timezone, e))?;
    let anchors = match &args.schedule_file {
        Some(path) => load_schedule(path)?,
        None => ScheduleAnchor::default_schedule(),
    };

    let config = PipelineConfig {
        retention_hours: args.retention_hours,
        timezone,
        anchors,
        calls_per_minute: args.calls_per_minute,
        cache_capacity: args.cache_capacity,
        cleanup_interval: Duration::from_secs(args.cleanup_interval_hours.max(1) * 3600),
        daily_quota: args.daily_quota,
        max_messages_per_channel: args.max_messages_per_summary,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let Some(discord_token) = args.discord_token.clone().filter(|t| !t.trim().is_empty()) else {
        bail!("DISCORD_BOT_TOKEN is not set");
    };
    let Some(api_key) = args.google_api_key.clone().filter(|k| !k.trim().is_empty()) else {
        bail!("GOOGLE_API_KEY is not set");
    };

    let config = pipeline_config(&args)?;
    info!(
        "digestbot starting: model={}, zone={}, retention={}h, {} anchors",
        args.model,
        config.timezone,
        config.retention_hours,
        config.anchors.len()
    );

    let generator = Arc::new(GeminiProvider::new(ProviderConfig::gemini(api_key, args.model.clone()))?);
    let ctx = Arc::new(BotContext::new(config, Arc::new(SystemClock), generator)?);

    let http = Arc::new(
        HttpClient::builder()
            .token(discord_token.clone())
            .timeout(Duration::from_secs(30))
            .build(),
    );

    let delivery = Arc::new(DiscordDelivery::new(http.clone()));
    let summaries = Arc::new(SummaryService::new(ctx.clone(), delivery));
    let commands = Arc::new(CommandService::new(ctx.clone(), summaries.clone()));
    let messages = Arc::new(MessageService::new(ctx.clone()));

    let mut runtime = DiscordRuntime::new(discord_token, http, messages, commands, ctx.config.timezone);
    runtime.connect().await?;

    let scheduler = Arc::new(SummaryScheduler::new(summaries));
    let scheduler_handle = spawn_summary_scheduler(scheduler);
    let prune_handle = spawn_cache_prune_task(
        ctx.buffer.clone(),
        ctx.retention_horizon(),
        ctx.config.cleanup_interval,
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {:?}", e);
    }
    warn!("Ctrl-C detected; shutting down...");

    scheduler_handle.abort();
    prune_handle.abort();
    runtime.disconnect().await;

    info!("Main finished. Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["digestbot", "--discord-token", "t", "--google-api-key", "k"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_build_a_valid_config() {
        let config = pipeline_config(&args(&[])).unwrap();
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.retention_hours, 168);
        assert_eq!(config.anchors.len(), 3);
        assert_eq!(config.cleanup_interval, Duration::from_secs(6 * 3600));
        assert_eq!(config.max_messages_per_channel, 50);
    }

    #[test]
    fn prompt_cap_is_configurable() {
        let config = pipeline_config(&args(&["--max-messages-per-summary", "20"])).unwrap();
        assert_eq!(config.max_messages_per_channel, 20);
        assert!(pipeline_config(&args(&["--max-messages-per-summary", "0"])).is_err());
    }

    #[test]
    fn bad_zone_and_short_retention_are_rejected() {
        assert!(pipeline_config(&args(&["--timezone", "Mars/Olympus"])).is_err());
        // the default weekly anchor needs a full week of retention
        assert!(pipeline_config(&args(&["--retention-hours", "24"])).is_err());
    }
}
