use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::events::{DiscordEvent, GuildInfo, MessageEvent, ReadyEvent};

/// The seam between the gateway and whatever consumes its events. The
/// transport layer only ever talks to this trait; it neither knows nor cares
/// what happens to an event afterwards.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_ready(&self, event: &ReadyEvent) -> Result<()>;
    async fn on_guild_discovered(&self, guild: &GuildInfo) -> Result<()>;
    async fn on_message_created(&self, event: &MessageEvent) -> Result<()>;
    async fn on_message_edited(&self, event: &MessageEvent) -> Result<()>;
}

pub struct EventProcessor {
    event_handler: Arc<dyn EventHandler>,
}

impl EventProcessor {
    pub fn new(event_handler: Arc<dyn EventHandler>) -> Self {
        Self { event_handler }
    }

    pub async fn process_event(&self, event: DiscordEvent) -> Result<()> {
        match event {
            DiscordEvent::Ready(ready) => self.event_handler.on_ready(&ready).await?,
            DiscordEvent::GuildDiscovered(guild) => {
                self.event_handler.on_guild_discovered(&guild).await?
            }
            DiscordEvent::MessageCreated(message) => {
                self.event_handler.on_message_created(&message).await?
            }
            DiscordEvent::MessageEdited(message) => {
                self.event_handler.on_message_edited(&message).await?
            }
        }
        Ok(())
    }
}
