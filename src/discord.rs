use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::config::Config;

pub mod cache;
pub mod event_handler;
pub mod events;

pub use self::cache::GatewayCache;
pub use self::event_handler::{EventHandler, EventProcessor};
pub use self::events::{
    AuthorInfo, ChannelInfo, ChannelKind, DiscordEvent, GuildInfo, MessageEvent, MessageKind,
    ReadyEvent,
};

use self::events::{
    GatewayChannel, GatewayGuild, GatewayHello, GatewayMessage, GatewayPayload, GatewayReady,
};

const API_BASE_URL: &str = "https://discord.com/api/v10";
const GATEWAY_QUERY: &str = "/?v=10&encoding=json";

const INITIAL_RETRY_SECONDS: u64 = 2;
const MAX_RETRY_SECONDS: u64 = 300;
// A session that survived this long resets the reconnect backoff.
const STABLE_SESSION_SECONDS: u64 = 60;

// Guilds, guild messages, message content.
const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Debug, Deserialize)]
struct GatewayInfo {
    url: String,
}

/// Gateway client: keeps one websocket session alive, answers heartbeats,
/// maintains the guild/channel cache and hands every decoded event to the
/// bound processor. Each event is dispatched as its own task so a handler
/// suspended on store I/O never delays the next frame.
pub struct DiscordClient {
    token: SecretString,
    http: reqwest::Client,
    cache: Arc<GatewayCache>,
    processor: RwLock<Option<Arc<EventProcessor>>>,
    stopped: AtomicBool,
}

impl DiscordClient {
    pub fn new(config: &Config) -> Result<Self> {
        let token = config
            .auth
            .bot_token
            .clone()
            .ok_or_else(|| anyhow!("bot token is not configured"))?;

        let http = reqwest::Client::builder()
            .user_agent("discord-reporter")
            .build()
            .context("failed to construct HTTP client")?;

        Ok(Self {
            token,
            http,
            cache: Arc::new(GatewayCache::new()),
            processor: RwLock::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    pub async fn set_processor(&self, processor: Arc<EventProcessor>) {
        *self.processor.write().await = Some(processor);
    }

    /// Runs sessions until `stop` is called, reconnecting with exponential
    /// backoff after every session end.
    pub async fn start(&self) -> Result<()> {
        let mut retry_seconds = INITIAL_RETRY_SECONDS;

        while !self.stopped.load(Ordering::SeqCst) {
            let started = Instant::now();
            let outcome = async {
                let url = self.fetch_gateway_url().await?;
                info!("connecting to gateway");
                self.run_session(&url).await
            }
            .await;

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            match outcome {
                Ok(()) => warn!("gateway session ended"),
                Err(err) => warn!("gateway session failed: {err:#}"),
            }

            if started.elapsed() >= Duration::from_secs(STABLE_SESSION_SECONDS) {
                retry_seconds = INITIAL_RETRY_SECONDS;
            }
            info!("reconnecting in {retry_seconds} seconds");
            tokio::time::sleep(Duration::from_secs(retry_seconds)).await;
            retry_seconds = (retry_seconds * 2).min(MAX_RETRY_SECONDS);
        }

        Ok(())
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        info!("discord client stopped");
    }

    async fn fetch_gateway_url(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{API_BASE_URL}/gateway/bot"))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", self.token.expose_secret()),
            )
            .send()
            .await
            .context("gateway info request failed")?
            .error_for_status()
            .context("gateway info request rejected")?;

        let info: GatewayInfo = response.json().await.context("undecodable gateway info")?;
        Ok(format!("{}{GATEWAY_QUERY}", info.url))
    }

    async fn run_session(&self, gateway_url: &str) -> Result<()> {
        let (stream, _) = connect_async(gateway_url)
            .await
            .context("gateway connect failed")?;
        let (mut write, mut read) = stream.split();

        // The first frame must be HELLO; it carries the heartbeat interval.
        let hello = loop {
            let frame = read
                .next()
                .await
                .ok_or_else(|| anyhow!("gateway closed before HELLO"))?
                .context("gateway read failed")?;
            if let WsMessage::Text(text) = frame {
                let payload: GatewayPayload =
                    serde_json::from_str(text.as_str()).context("undecodable HELLO frame")?;
                if payload.op == OP_HELLO {
                    break serde_json::from_value::<GatewayHello>(payload.d)
                        .context("undecodable HELLO payload")?;
                }
            }
        };

        write
            .send(WsMessage::Text(self.identify_payload().to_string().into()))
            .await
            .context("identify failed")?;

        let mut heartbeat =
            tokio::time::interval(Duration::from_millis(hello.heartbeat_interval));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await; // the first tick completes immediately

        let mut last_seq: Option<u64> = None;
        let mut acked = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        bail!("gateway missed a heartbeat ack");
                    }
                    acked = false;
                    write
                        .send(WsMessage::Text(json!({"op": OP_HEARTBEAT, "d": last_seq}).to_string().into()))
                        .await
                        .context("heartbeat send failed")?;
                }
                frame = read.next() => {
                    let frame = frame
                        .ok_or_else(|| anyhow!("gateway stream ended"))?
                        .context("gateway read failed")?;
                    match frame {
                        WsMessage::Text(text) => {
                            let payload: GatewayPayload = match serde_json::from_str(text.as_str()) {
                                Ok(payload) => payload,
                                Err(err) => {
                                    warn!("undecodable gateway frame: {err}");
                                    continue;
                                }
                            };
                            if let Some(seq) = payload.s {
                                last_seq = Some(seq);
                            }
                            match payload.op {
                                OP_DISPATCH => {
                                    if let Some(kind) = payload.t.as_deref() {
                                        self.handle_dispatch(kind, payload.d).await;
                                    }
                                }
                                OP_HEARTBEAT => {
                                    write
                                        .send(WsMessage::Text(json!({"op": OP_HEARTBEAT, "d": last_seq}).to_string().into()))
                                        .await
                                        .context("heartbeat send failed")?;
                                }
                                OP_HEARTBEAT_ACK => acked = true,
                                OP_RECONNECT => bail!("gateway requested a reconnect"),
                                OP_INVALID_SESSION => bail!("gateway invalidated the session"),
                                other => debug!("unhandled gateway opcode: {other}"),
                            }
                        }
                        WsMessage::Ping(data) => {
                            write.send(WsMessage::Pong(data)).await.context("pong send failed")?;
                        }
                        WsMessage::Close(frame) => bail!("gateway closed the connection: {frame:?}"),
                        _ => {}
                    }
                }
            }
        }
    }

    fn identify_payload(&self) -> Value {
        json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token.expose_secret(),
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "discord-reporter",
                    "device": "discord-reporter",
                },
            },
        })
    }

    async fn handle_dispatch(&self, kind: &str, data: Value) {
        match kind {
            "READY" => match serde_json::from_value::<GatewayReady>(data) {
                Ok(ready) => {
                    info!(
                        "bot '{}' connected, member of {} guilds",
                        ready.user.username,
                        ready.guilds.len()
                    );
                    self.dispatch(DiscordEvent::Ready(ReadyEvent {
                        user_id: ready.user.id,
                        username: ready.user.username,
                        guild_count: ready.guilds.len(),
                    }))
                    .await;
                }
                Err(err) => warn!("undecodable READY payload: {err}"),
            },
            "GUILD_CREATE" | "GUILD_UPDATE" => {
                match serde_json::from_value::<GatewayGuild>(data) {
                    Ok(guild) => {
                        let info = self.cache.insert_guild(&guild);
                        debug!(
                            "cached guild '{}', {} guilds known",
                            info.name,
                            self.cache.guild_count()
                        );
                        self.dispatch(DiscordEvent::GuildDiscovered(info)).await;
                    }
                    Err(err) => warn!("undecodable guild payload: {err}"),
                }
            }
            "GUILD_DELETE" => {
                if let Some(id) = data.get("id").and_then(Value::as_str) {
                    self.cache.remove_guild(id);
                }
            }
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => {
                match serde_json::from_value::<GatewayChannel>(data) {
                    Ok(channel) => self.cache.upsert_channel(&channel),
                    Err(err) => warn!("undecodable channel payload: {err}"),
                }
            }
            "CHANNEL_DELETE" => {
                if let Some(id) = data.get("id").and_then(Value::as_str) {
                    self.cache.remove_channel(id);
                }
            }
            "MESSAGE_CREATE" => self.handle_message(data, false).await,
            "MESSAGE_UPDATE" => self.handle_message(data, true).await,
            other => debug!("unhandled gateway dispatch: {other}"),
        }
    }

    async fn handle_message(&self, data: Value, edited: bool) {
        let wire: GatewayMessage = match serde_json::from_value(data) {
            Ok(message) => message,
            Err(err) => {
                warn!("undecodable message payload: {err}");
                return;
            }
        };

        let Some(event) = self.build_message_event(wire) else {
            // Partial MESSAGE_UPDATE frames (embed unfurls and the like)
            // carry no author; there is nothing to record.
            debug!("dropping partial message payload");
            return;
        };

        let event = if edited {
            DiscordEvent::MessageEdited(event)
        } else {
            DiscordEvent::MessageCreated(event)
        };
        self.dispatch(event).await;
    }

    fn build_message_event(&self, wire: GatewayMessage) -> Option<MessageEvent> {
        let author = AuthorInfo::from(wire.author.as_ref()?);
        let timestamp = wire.timestamp?;
        let channel = self.cache.channel(&wire.channel_id);
        let guild = wire
            .guild_id
            .as_deref()
            .and_then(|id| self.cache.guild(id));

        Some(MessageEvent {
            platform_id: wire.id,
            kind: MessageKind::from(wire.kind),
            channel_id: wire.channel_id,
            guild_id: wire.guild_id,
            channel,
            guild,
            author,
            content: wire.content.unwrap_or_default(),
            timestamp,
            edited_timestamp: wire.edited_timestamp,
            attachments: wire.attachments.into_iter().map(|a| a.url).collect(),
        })
    }

    async fn dispatch(&self, event: DiscordEvent) {
        let processor = self.processor.read().await.clone();
        match processor {
            Some(processor) => {
                tokio::spawn(async move {
                    if let Err(err) = processor.process_event(event).await {
                        warn!("event handler failed: {err:#}");
                    }
                });
            }
            None => debug!("gateway event received without processor binding"),
        }
    }
}
