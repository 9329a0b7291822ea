use std::collections::HashMap;

use parking_lot::RwLock;

use super::events::{ChannelInfo, ChannelKind, GatewayChannel, GatewayGuild, GuildInfo};

struct CachedChannel {
    info: ChannelInfo,
    guild_id: Option<String>,
}

#[derive(Default)]
struct CacheInner {
    guilds: HashMap<String, GuildInfo>,
    channels: HashMap<String, CachedChannel>,
}

/// Guild and channel metadata, keyed by platform id. Message payloads carry
/// neither channel names nor channel kinds, so the gateway feeds this cache
/// from GUILD_CREATE / CHANNEL_* dispatches and message handling reads from
/// it.
#[derive(Default)]
pub struct GatewayCache {
    inner: RwLock<CacheInner>,
}

impl GatewayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_guild(&self, guild: &GatewayGuild) -> GuildInfo {
        let info = GuildInfo::from(guild);
        let mut inner = self.inner.write();
        inner.guilds.insert(info.platform_id.clone(), info.clone());
        for channel in &guild.channels {
            if let Some(cached) = cache_channel(channel, Some(guild.id.clone())) {
                inner.channels.insert(channel.id.clone(), cached);
            }
        }
        info
    }

    pub fn remove_guild(&self, guild_id: &str) {
        let mut inner = self.inner.write();
        inner.guilds.remove(guild_id);
        inner
            .channels
            .retain(|_, cached| cached.guild_id.as_deref() != Some(guild_id));
    }

    pub fn upsert_channel(&self, channel: &GatewayChannel) {
        if let Some(cached) = cache_channel(channel, channel.guild_id.clone()) {
            self.inner.write().channels.insert(channel.id.clone(), cached);
        }
    }

    pub fn remove_channel(&self, channel_id: &str) {
        self.inner.write().channels.remove(channel_id);
    }

    pub fn guild(&self, guild_id: &str) -> Option<GuildInfo> {
        self.inner.read().guilds.get(guild_id).cloned()
    }

    pub fn channel(&self, channel_id: &str) -> Option<ChannelInfo> {
        self.inner
            .read()
            .channels
            .get(channel_id)
            .map(|cached| cached.info.clone())
    }

    pub fn guild_count(&self) -> usize {
        self.inner.read().guilds.len()
    }
}

fn cache_channel(channel: &GatewayChannel, guild_id: Option<String>) -> Option<CachedChannel> {
    // DM channels have no name; their id is all the pipeline ever sees.
    let name = channel.name.clone()?;
    Some(CachedChannel {
        info: ChannelInfo {
            platform_id: channel.id.clone(),
            name,
            kind: ChannelKind::from(channel.kind),
        },
        guild_id,
    })
}
