use std::sync::Arc;

use diesel::Connection;
use diesel::RunQueryDsl;
use diesel::sqlite::SqliteConnection;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::db::sqlite::{
    SharedConnection, SqliteChannelStore, SqliteMessageStore, SqliteServerStore, SqliteUserStore,
};
use crate::db::{ChannelStore, DatabaseError, MessageStore, ServerStore, UserStore};

/// Owns the single SQLite connection and hands out the entity stores built on
/// top of it. Components never open connections of their own.
#[derive(Clone)]
pub struct DatabaseManager {
    conn: SharedConnection,
    server_store: Arc<dyn ServerStore>,
    channel_store: Arc<dyn ChannelStore>,
    user_store: Arc<dyn UserStore>,
    message_store: Arc<dyn MessageStore>,
}

impl DatabaseManager {
    pub fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Self::connect(&config.path)
    }

    /// A private in-memory store, used by tests.
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        Self::connect(":memory:")
    }

    fn connect(path: &str) -> Result<Self, DatabaseError> {
        let mut conn = SqliteConnection::establish(path)
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        // SQLite does not enforce foreign keys unless asked to.
        diesel::sql_query("PRAGMA foreign_keys = ON")
            .execute(&mut conn)
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let conn: SharedConnection = Arc::new(Mutex::new(conn));

        Ok(Self {
            server_store: Arc::new(SqliteServerStore::new(conn.clone())),
            channel_store: Arc::new(SqliteChannelStore::new(conn.clone())),
            user_store: Arc::new(SqliteUserStore::new(conn.clone())),
            message_store: Arc::new(SqliteMessageStore::new(conn.clone())),
            conn,
        })
    }

    /// Creates the schema if it is missing. Safe to run on every startup.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS servers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    created_at TEXT,
                    member_count INTEGER,
                    owner_platform_id TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS channels (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    server_id INTEGER NOT NULL REFERENCES servers(id),
                    UNIQUE (platform_id, name, server_id)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform_id TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL,
                    discriminator TEXT
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform_id TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    content TEXT NOT NULL,
                    author_id INTEGER NOT NULL REFERENCES users(id),
                    channel_id INTEGER NOT NULL REFERENCES channels(id),
                    server_id INTEGER NOT NULL REFERENCES servers(id),
                    is_edited INTEGER NOT NULL DEFAULT 0,
                    attachments_url TEXT
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_channels_server ON channels(server_id)",
                "CREATE INDEX IF NOT EXISTS idx_messages_author ON messages(author_id)",
                "CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel_id)",
                "CREATE INDEX IF NOT EXISTS idx_messages_server ON messages(server_id)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut *conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            debug!("store schema is up to date");
            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn server_store(&self) -> Arc<dyn ServerStore> {
        self.server_store.clone()
    }

    pub fn channel_store(&self) -> Arc<dyn ChannelStore> {
        self.channel_store.clone()
    }

    pub fn user_store(&self) -> Arc<dyn UserStore> {
        self.user_store.clone()
    }

    pub fn message_store(&self) -> Arc<dyn MessageStore> {
        self.message_store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewChannel, NewMessage, NewServer, NewUser};

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db = DatabaseManager::new_in_memory().unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.server_store().count_servers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn migrate_runs_against_a_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("discord.db").to_string_lossy().into_owned(),
        };
        let db = DatabaseManager::open(&config).unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.user_store().count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn round_trip_preserves_every_field() {
        let db = DatabaseManager::new_in_memory().unwrap();
        db.migrate().await.unwrap();

        let new_server = NewServer {
            platform_id: "S1".to_string(),
            name: "rust hideout".to_string(),
            created_at: Some("2016-04-30T11:18:25+00:00".to_string()),
            member_count: Some(42),
            owner_platform_id: Some("1234567890".to_string()),
        };
        let server_id = db.server_store().create_server(&new_server).await.unwrap();

        let server = db
            .server_store()
            .get_server_by_platform_id("S1")
            .await
            .unwrap()
            .expect("server row");
        assert_eq!(server.id, server_id);
        assert_eq!(server.platform_id, new_server.platform_id);
        assert_eq!(server.name, new_server.name);
        assert_eq!(server.created_at, new_server.created_at);
        assert_eq!(server.member_count, new_server.member_count);
        assert_eq!(server.owner_platform_id, new_server.owner_platform_id);

        let new_channel = NewChannel {
            platform_id: "C1".to_string(),
            name: "general".to_string(),
        };
        let channel_id = db
            .channel_store()
            .create_channel(&new_channel, server_id)
            .await
            .unwrap();
        let channel = db
            .channel_store()
            .get_channel("C1", "general", server_id)
            .await
            .unwrap()
            .expect("channel row");
        assert_eq!(channel.id, channel_id);
        assert_eq!(channel.server_id, server_id);

        let new_user = NewUser {
            platform_id: "U1".to_string(),
            username: "alice".to_string(),
            discriminator: Some("0042".to_string()),
        };
        let author_id = db.user_store().create_user(&new_user).await.unwrap();
        let user = db
            .user_store()
            .get_user_by_platform_id("U1")
            .await
            .unwrap()
            .expect("user row");
        assert_eq!(user.id, author_id);
        assert_eq!(user.username, new_user.username);
        assert_eq!(user.discriminator, new_user.discriminator);

        let new_message = NewMessage {
            platform_id: "M1".to_string(),
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
            content: "hello there".to_string(),
            author_id,
            channel_id,
            server_id,
            is_edited: false,
            attachments_url: Some("https://cdn.example/a.png, https://cdn.example/b.png".to_string()),
        };
        db.message_store().upsert_message(&new_message).await.unwrap();
        let message = db
            .message_store()
            .get_message_by_platform_id("M1")
            .await
            .unwrap()
            .expect("message row");
        assert_eq!(message.platform_id, new_message.platform_id);
        assert_eq!(message.created_at, new_message.created_at);
        assert_eq!(message.content, new_message.content);
        assert_eq!(message.author_id, author_id);
        assert_eq!(message.channel_id, channel_id);
        assert_eq!(message.server_id, server_id);
        assert!(!message.is_edited);
        assert_eq!(message.attachments_url, new_message.attachments_url);
    }
}
