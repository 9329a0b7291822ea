use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{DatabaseError, DatabaseManager, MessageStore};
use crate::discord::event_handler::EventHandler;
use crate::discord::events::{GuildInfo, MessageEvent, ReadyEvent};
use crate::utils::logging::ErrorLog;

pub mod assembler;
pub mod filter;
pub mod normalizer;
pub mod resolver;

pub use self::filter::should_ignore;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error(transparent)]
    Persistence(#[from] DatabaseError),
}

/// Drives one event through filter, normalization, resolution, assembly and
/// persistence. Failures stop here: they are written to the error log and
/// the event is dropped; the listener keeps running whatever happens to a
/// single event.
pub struct RecorderCore {
    db: Arc<DatabaseManager>,
    error_log: Arc<ErrorLog>,
    self_id: RwLock<Option<String>>,
}

impl RecorderCore {
    pub fn new(db: Arc<DatabaseManager>, error_log: Arc<ErrorLog>) -> Self {
        Self {
            db,
            error_log,
            self_id: RwLock::new(None),
        }
    }

    async fn record_message(
        &self,
        event: &MessageEvent,
        is_edited: bool,
    ) -> Result<i64, RecorderError> {
        let normalized = normalizer::normalize(event, is_edited)?;
        let resolver = resolver::IdentityResolver::new(&self.db);
        let ids = resolver.resolve(&normalized).await?;
        let message = assembler::assemble(ids, normalized.message);
        Ok(self.db.message_store().upsert_message(&message).await?)
    }

    async fn handle_message(&self, event: &MessageEvent, is_edited: bool) {
        let ignore = {
            let self_id = self.self_id.read();
            should_ignore(self_id.as_deref(), event)
        };
        if ignore {
            debug!("ignoring message {}", event.platform_id);
            return;
        }

        match self.record_message(event, is_edited).await {
            Ok(row_id) => debug!("recorded message {} as row {row_id}", event.platform_id),
            Err(err) => self.error_log.append(&format!(
                "could not record message {}: {err}",
                event.platform_id
            )),
        }
    }
}

#[async_trait]
impl EventHandler for RecorderCore {
    async fn on_ready(&self, event: &ReadyEvent) -> Result<()> {
        *self.self_id.write() = Some(event.user_id.clone());
        info!(
            "recording as '{}' across {} guilds",
            event.username, event.guild_count
        );
        Ok(())
    }

    async fn on_guild_discovered(&self, guild: &GuildInfo) -> Result<()> {
        let server = normalizer::server_from_guild(guild);
        let resolver = resolver::IdentityResolver::new(&self.db);
        match resolver.resolve_server(&server).await {
            Ok(row_id) => debug!("server {} resolved to row {row_id}", guild.platform_id),
            Err(err) => self.error_log.append(&format!(
                "could not resolve server {}: {err}",
                guild.platform_id
            )),
        }
        Ok(())
    }

    async fn on_message_created(&self, event: &MessageEvent) -> Result<()> {
        self.handle_message(event, false).await;
        Ok(())
    }

    async fn on_message_edited(&self, event: &MessageEvent) -> Result<()> {
        self.handle_message(event, true).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::db::{ChannelStore, ServerStore, UserStore};
    use crate::discord::events::{AuthorInfo, ChannelInfo, ChannelKind, MessageKind};

    struct Fixture {
        core: RecorderCore,
        db: Arc<DatabaseManager>,
        error_log_path: std::path::PathBuf,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let error_log_path = dir.path().join("reporter.log");
        let db = Arc::new(DatabaseManager::new_in_memory().unwrap());
        db.migrate().await.unwrap();
        let core = RecorderCore::new(db.clone(), Arc::new(ErrorLog::new(&error_log_path)));
        Fixture {
            core,
            db,
            error_log_path,
            _dir: dir,
        }
    }

    fn event(message_id: &str, author_id: &str, content: &str) -> MessageEvent {
        MessageEvent {
            platform_id: message_id.to_string(),
            kind: MessageKind::Default,
            channel_id: "C1".to_string(),
            guild_id: Some("G1".to_string()),
            channel: Some(ChannelInfo {
                platform_id: "C1".to_string(),
                name: "general".to_string(),
                kind: ChannelKind::GuildText,
            }),
            guild: Some(GuildInfo {
                platform_id: "G1".to_string(),
                name: "rust hideout".to_string(),
                created_at: Some("2016-04-30T11:18:25+00:00".to_string()),
                member_count: Some(42),
                owner_platform_id: Some("O1".to_string()),
            }),
            author: AuthorInfo {
                platform_id: author_id.to_string(),
                username: "alice".to_string(),
                discriminator: None,
            },
            content: content.to_string(),
            timestamp: "2024-05-01T10:00:00+00:00".to_string(),
            edited_timestamp: None,
            attachments: Vec::new(),
        }
    }

    async fn counts(db: &DatabaseManager) -> (i64, i64, i64, i64) {
        (
            db.server_store().count_servers().await.unwrap(),
            db.channel_store().count_channels().await.unwrap(),
            db.user_store().count_users().await.unwrap(),
            db.message_store().count_messages().await.unwrap(),
        )
    }

    #[tokio::test]
    async fn one_message_fills_all_four_tables() {
        let f = fixture().await;
        f.core.on_message_created(&event("M1", "U1", "hello")).await.unwrap();

        assert_eq!(counts(&f.db).await, (1, 1, 1, 1));
        let message = f
            .db
            .message_store()
            .get_message_by_platform_id("M1")
            .await
            .unwrap()
            .expect("message row");
        assert!(!message.is_edited);
        assert_eq!(message.attachments_url, None);

        // Foreign keys point at the rows created during the same event.
        let server = f.db.server_store().get_server_by_platform_id("G1").await.unwrap().unwrap();
        let user = f.db.user_store().get_user_by_platform_id("U1").await.unwrap().unwrap();
        assert_eq!(message.server_id, server.id);
        assert_eq!(message.author_id, user.id);
    }

    #[tokio::test]
    async fn an_edit_updates_the_message_but_duplicates_nothing() {
        let f = fixture().await;
        f.core.on_message_created(&event("M1", "U1", "typo")).await.unwrap();

        let mut edit = event("M1", "U1", "fixed");
        edit.edited_timestamp = Some("2024-05-01T10:05:00+00:00".to_string());
        f.core.on_message_edited(&edit).await.unwrap();

        assert_eq!(counts(&f.db).await, (1, 1, 1, 1));
        let message = f
            .db
            .message_store()
            .get_message_by_platform_id("M1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.content, "fixed");
        assert!(message.is_edited);
        assert_eq!(message.created_at, "2024-05-01T10:00:00+00:00");
    }

    #[tokio::test]
    async fn a_redelivered_create_stays_one_row() {
        let f = fixture().await;
        let message = event("M1", "U1", "hello");
        f.core.on_message_created(&message).await.unwrap();
        f.core.on_message_created(&message).await.unwrap();

        assert_eq!(counts(&f.db).await, (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn own_messages_are_never_persisted() {
        let f = fixture().await;
        f.core
            .on_ready(&ReadyEvent {
                user_id: "BOT".to_string(),
                username: "reporter".to_string(),
                guild_count: 1,
            })
            .await
            .unwrap();

        f.core.on_message_created(&event("M1", "BOT", "hi")).await.unwrap();
        assert_eq!(counts(&f.db).await, (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn direct_messages_are_never_persisted() {
        let f = fixture().await;
        let mut dm = event("M1", "U1", "psst");
        dm.guild_id = None;
        dm.guild = None;
        dm.channel = None;
        f.core.on_message_created(&dm).await.unwrap();

        assert_eq!(counts(&f.db).await, (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn malformed_events_land_in_the_error_log() {
        let f = fixture().await;
        // Guild id present but never described by the gateway: unresolvable.
        let mut orphaned = event("M1", "U1", "hello");
        orphaned.guild = None;
        f.core.on_message_created(&orphaned).await.unwrap();

        assert_eq!(counts(&f.db).await, (0, 0, 0, 0));
        let log = std::fs::read_to_string(&f.error_log_path).unwrap();
        assert!(log.contains("malformed event"), "log was: {log}");
    }

    #[tokio::test]
    async fn guild_discovery_creates_the_server_row_once() {
        let f = fixture().await;
        let guild = GuildInfo {
            platform_id: "G1".to_string(),
            name: "rust hideout".to_string(),
            created_at: None,
            member_count: Some(42),
            owner_platform_id: None,
        };
        f.core.on_guild_discovered(&guild).await.unwrap();
        f.core.on_guild_discovered(&guild).await.unwrap();

        assert_eq!(f.db.server_store().count_servers().await.unwrap(), 1);
    }
}
