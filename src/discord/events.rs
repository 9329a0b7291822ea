use chrono::DateTime;
use serde::Deserialize;

/// Milliseconds between the Unix epoch and the platform's snowflake epoch
/// (2015-01-01T00:00:00Z).
const SNOWFLAKE_EPOCH_MS: i64 = 1_420_070_400_000;

const MESSAGE_TYPE_DEFAULT: u8 = 0;
const MESSAGE_TYPE_REPLY: u8 = 19;

const CHANNEL_TYPE_GUILD_TEXT: u8 = 0;
const CHANNEL_TYPE_DM: u8 = 1;
const CHANNEL_TYPE_GROUP_DM: u8 = 3;

/// The internal shape of everything the gateway can deliver that the
/// recorder cares about. The transport layer translates raw payloads into
/// this union; nothing downstream ever touches gateway JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscordEvent {
    Ready(ReadyEvent),
    GuildDiscovered(GuildInfo),
    MessageCreated(MessageEvent),
    MessageEdited(MessageEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyEvent {
    pub user_id: String,
    pub username: String,
    pub guild_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildInfo {
    pub platform_id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub member_count: Option<i64>,
    pub owner_platform_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub platform_id: String,
    pub name: String,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    GuildText,
    Dm,
    Group,
    Other(u8),
}

impl ChannelKind {
    pub fn is_private(self) -> bool {
        matches!(self, ChannelKind::Dm | ChannelKind::Group)
    }
}

impl From<u8> for ChannelKind {
    fn from(value: u8) -> Self {
        match value {
            CHANNEL_TYPE_GUILD_TEXT => ChannelKind::GuildText,
            CHANNEL_TYPE_DM => ChannelKind::Dm,
            CHANNEL_TYPE_GROUP_DM => ChannelKind::Group,
            other => ChannelKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Default,
    Reply,
    Other(u8),
}

impl MessageKind {
    pub fn is_recordable(self) -> bool {
        matches!(self, MessageKind::Default | MessageKind::Reply)
    }
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        match value {
            MESSAGE_TYPE_DEFAULT => MessageKind::Default,
            MESSAGE_TYPE_REPLY => MessageKind::Reply,
            other => MessageKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorInfo {
    pub platform_id: String,
    pub username: String,
    pub discriminator: Option<String>,
}

/// A message event after cache enrichment. `guild_id` is what the wire
/// carried (absent for direct messages); `guild` and `channel` stay `None`
/// when the cache holds nothing for them. The pipeline decides what each
/// kind of absence means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub platform_id: String,
    pub kind: MessageKind,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub channel: Option<ChannelInfo>,
    pub guild: Option<GuildInfo>,
    pub author: AuthorInfo,
    pub content: String,
    pub timestamp: String,
    pub edited_timestamp: Option<String>,
    pub attachments: Vec<String>,
}

/// Creation instant encoded in a snowflake id, as an ISO-8601 string.
pub fn snowflake_timestamp(id: &str) -> Option<String> {
    let id: u64 = id.parse().ok()?;
    let millis = (id >> 22) as i64 + SNOWFLAKE_EPOCH_MS;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

// Raw gateway payloads.

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub d: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayHello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayReady {
    pub user: GatewayUser,
    #[serde(default)]
    pub guilds: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayGuild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub member_count: Option<i64>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub channels: Vec<GatewayChannel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub author: Option<GatewayUser>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    #[serde(default)]
    pub attachments: Vec<GatewayAttachment>,
    #[serde(default, rename = "type")]
    pub kind: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayAttachment {
    pub url: String,
}

impl From<&GatewayGuild> for GuildInfo {
    fn from(guild: &GatewayGuild) -> Self {
        GuildInfo {
            platform_id: guild.id.clone(),
            name: guild.name.clone(),
            created_at: snowflake_timestamp(&guild.id),
            member_count: guild.member_count,
            owner_platform_id: guild.owner_id.clone(),
        }
    }
}

impl From<&GatewayUser> for AuthorInfo {
    fn from(user: &GatewayUser) -> Self {
        AuthorInfo {
            platform_id: user.id.clone(),
            username: user.username.clone(),
            // The legacy "#0000" discriminator shows up as literal zeroes on
            // migrated accounts; treat that the same as absent.
            discriminator: user
                .discriminator
                .clone()
                .filter(|d| !d.is_empty() && d.as_str() != "0" && d.as_str() != "0000"),
        }
    }
}
