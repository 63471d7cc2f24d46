use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway, CloseFrame, Config, Event, EventTypeFlags, Intents, MessageSender, Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_model::gateway::payload::incoming::{GuildCreate, GuildDelete, MessageCreate, Ready as ReadyPayload};
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{ChannelMarker, RoleMarker};
use twilight_model::id::Id;

use digestbot_common::models::{ChannelId, InboundMessage, ServerId, SummaryArtifact};
use digestbot_common::traits::SummaryDelivery;

use super::embed::{recent_embed, status_embed, summary_embed, system_embed, usage_embed};
use crate::services::{CommandContext, CommandResponse, CommandService, Ingest, MessageService};
use crate::Error;

/// What the shard runners hand to the dispatcher. Only plain data crosses
/// this boundary; no twilight types reach the services.
#[derive(Debug, Clone)]
pub enum DiscordEvent {
    Message { message: InboundMessage, is_admin: bool },
    GuildJoined { id: ServerId, name: String },
    GuildLeft { id: ServerId },
}

fn channel_id(id: ChannelId) -> Result<Id<ChannelMarker>, Error> {
    Id::new_checked(id).ok_or_else(|| Error::Platform(format!("Invalid channel ID: {id}")))
}

fn jump_url(msg: &MessageCreate) -> String {
    match msg.guild_id {
        Some(guild) => format!("https://discord.com/channels/{}/{}/{}", guild, msg.channel_id, msg.id),
        None => format!("https://discord.com/channels/@me/{}/{}", msg.channel_id, msg.id),
    }
}

/// Guild owner, or any held role (including @everyone) carrying ADMINISTRATOR.
fn is_admin(cache: &InMemoryCache, msg: &MessageCreate) -> bool {
    let Some(guild_id) = msg.guild_id else {
        return false;
    };
    if cache
        .guild(guild_id)
        .is_some_and(|guild| guild.value().owner_id() == msg.author.id)
    {
        return true;
    }
    let roles = msg.member.as_ref().map(|m| m.roles.clone()).unwrap_or_default();
    std::iter::once(guild_id.cast::<RoleMarker>())
        .chain(roles)
        .any(|role_id| {
            cache.role(role_id).is_some_and(|role| {
                role.value()
                    .resource()
                    .permissions
                    .contains(Permissions::ADMINISTRATOR)
            })
        })
}

fn to_inbound(cache: &InMemoryCache, msg: &MessageCreate) -> InboundMessage {
    let channel_name = cache
        .channel(msg.channel_id)
        .and_then(|ch| ch.value().name.clone())
        .unwrap_or_else(|| msg.channel_id.to_string());
    let author = msg
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone());
    let timestamp = DateTime::<Utc>::from_timestamp_micros(msg.timestamp.as_micros()).unwrap_or_else(Utc::now);

    InboundMessage {
        server_id: msg.guild_id.map(|g| g.get()),
        channel_id: msg.channel_id.get(),
        channel_name,
        author,
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        timestamp,
        attachment_count: msg.attachments.len() as u32,
        embed_count: msg.embeds.len() as u32,
        origin_ref: jump_url(msg),
    }
}

/// A guild going dark during an outage also arrives as a delete, flagged
/// `unavailable`; only a real removal means the bot left.
fn guild_left(gone: &GuildDelete) -> Option<DiscordEvent> {
    if gone.unavailable == Some(true) {
        debug!("Guild {} went unavailable; keeping its state", gone.id);
        return None;
    }
    Some(DiscordEvent::GuildLeft { id: gone.id.get() })
}

/// Reads gateway events, keeps the cache current and forwards what the
/// bot cares about to `tx`.
async fn shard_runner(mut shard: Shard, tx: UnboundedSender<DiscordEvent>, cache: Arc<InMemoryCache>) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };
        cache.update(&event);

        let forwarded = match &event {
            Event::Ready(ready) => {
                let data: &ReadyPayload = ready.as_ref();
                info!("Shard {shard_id} => READY as {} (ID={})", data.user.name, data.user.id);
                None
            }
            Event::MessageCreate(msg) => Some(DiscordEvent::Message {
                message: to_inbound(&cache, msg),
                is_admin: is_admin(&cache, msg),
            }),
            Event::GuildCreate(guild) => match &**guild {
                GuildCreate::Available(g) => Some(DiscordEvent::GuildJoined {
                    id: g.id.get(),
                    name: g.name.clone(),
                }),
                GuildCreate::Unavailable(g) => {
                    debug!("Shard {shard_id} => guild {} unavailable", g.id);
                    None
                }
            },
            Event::GuildDelete(gone) => guild_left(gone),
            _ => {
                trace!("Shard {shard_id} => unhandled event: {:?}", event.kind());
                None
            }
        };

        if let Some(ev) = forwarded {
            if tx.send(ev).is_err() {
                warn!("Shard {shard_id} => dispatcher gone, stopping");
                break;
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

async fn send_response(
    http: &HttpClient,
    channel: ChannelId,
    response: CommandResponse,
    timezone: Tz,
) -> Result<(), Error> {
    let channel = channel_id(channel)?;
    let embed = match response {
        CommandResponse::Text(text) => {
            http.create_message(channel)
                .content(&text)
                .await
                .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?;
            return Ok(());
        }
        CommandResponse::Summary(artifact) => summary_embed(&artifact),
        CommandResponse::Recent { channel_name, messages } => recent_embed(&channel_name, &messages, timezone),
        CommandResponse::Status(report) => status_embed(&report),
        CommandResponse::Usage(usage) => usage_embed(&usage),
        CommandResponse::System(report) => system_embed(&report),
    };
    http.create_message(channel)
        .embeds(&[embed])
        .await
        .map_err(|e| Error::Platform(format!("Error sending Discord embed: {e:?}")))?;
    Ok(())
}

/// Routes forwarded events into the services. Commands run in their own
/// task since a summary can wait on the rate limiter.
async fn dispatch(
    mut rx: UnboundedReceiver<DiscordEvent>,
    http: Arc<HttpClient>,
    messages: Arc<MessageService>,
    commands: Arc<CommandService>,
    timezone: Tz,
) {
    while let Some(event) = rx.recv().await {
        match event {
            DiscordEvent::Message { message, is_admin } => {
                if messages.on_message(&message) != Ingest::Command {
                    continue;
                }
                let Some(server_id) = message.server_id else {
                    continue;
                };
                let ctx = CommandContext {
                    server_id,
                    channel_id: message.channel_id,
                    is_admin,
                };
                let http = http.clone();
                let commands = commands.clone();
                tokio::spawn(async move {
                    if let Some(response) = commands.handle(&ctx, &message.content).await {
                        if let Err(e) = send_response(&http, ctx.channel_id, response, timezone).await {
                            error!("Command reply in channel {} failed: {}", ctx.channel_id, e);
                        }
                    }
                });
            }
            DiscordEvent::GuildJoined { id, name } => {
                messages.on_server_joined(id, &name);
            }
            DiscordEvent::GuildLeft { id } => {
                messages.on_server_left(id);
            }
        }
    }
    info!("(DiscordRuntime) dispatcher stopped");
}

pub struct DiscordRuntime {
    token: String,
    http: Arc<HttpClient>,
    messages: Arc<MessageService>,
    commands: Arc<CommandService>,
    timezone: Tz,
    shard_tasks: Vec<JoinHandle<()>>,
    shard_senders: Vec<MessageSender>,
    dispatcher: Option<JoinHandle<()>>,
}

impl DiscordRuntime {
    pub fn new(
        token: String,
        http: Arc<HttpClient>,
        messages: Arc<MessageService>,
        commands: Arc<CommandService>,
        timezone: Tz,
    ) -> Self {
        Self {
            token,
            http,
            messages,
            commands,
            timezone,
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            dispatcher: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.token.is_empty() {
            return Err(Error::Config("Discord token is empty".into()));
        }
        if self.dispatcher.is_some() {
            info!("(DiscordRuntime) Already connected => skipping");
            return Ok(());
        }

        let (tx, rx) = unbounded_channel::<DiscordEvent>();

        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(ResourceType::GUILD | ResourceType::CHANNEL | ResourceType::ROLE)
                .build(),
        );

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT,
        );
        let shards = gateway::create_recommended(&self.http, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?;

        for shard in shards {
            self.shard_senders.push(shard.sender());
            let handle = tokio::spawn(shard_runner(shard, tx.clone(), cache.clone()));
            self.shard_tasks.push(handle);
        }
        info!("(DiscordRuntime) {} shard(s) started", self.shard_tasks.len());

        self.dispatcher = Some(tokio::spawn(dispatch(
            rx,
            self.http.clone(),
            self.messages.clone(),
            self.commands.clone(),
            self.timezone,
        )));
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for task in self.shard_tasks.drain(..) {
            let _ = task.await;
        }
        self.shard_senders.clear();
        // every sender is gone once the shards end, so the dispatcher drains and exits
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.await;
        }
        info!("(DiscordRuntime) disconnected");
    }
}

/// Posts summary artifacts as embeds.
pub struct DiscordDelivery {
    http: Arc<HttpClient>,
}

impl DiscordDelivery {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SummaryDelivery for DiscordDelivery {
    async fn deliver(&self, target: ChannelId, artifact: &SummaryArtifact) -> Result<(), Error> {
        let channel = channel_id(target)?;
        self.http
            .create_message(channel)
            .embeds(&[summary_embed(artifact)])
            .await
            .map_err(|e| Error::Delivery(format!("channel {target}: {e}")))?;
        Ok(())
    }
}
