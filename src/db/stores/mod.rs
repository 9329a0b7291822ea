use async_trait::async_trait;

use super::DatabaseError;
use super::models::{
    ChannelRecord, MessageRecord, NewChannel, NewMessage, NewServer, NewUser, ServerRecord,
    UserRecord,
};

/// Entity creation returns the store-generated local id, read back inside the
/// same transaction as the insert. A create against an already-known natural
/// key fails with `DatabaseError::ConstraintViolation`; callers resolve it
/// with the matching `get_*` lookup rather than checking for existence first.
#[async_trait]
pub trait ServerStore: Send + Sync {
    async fn create_server(&self, server: &NewServer) -> Result<i64, DatabaseError>;
    async fn get_server_by_platform_id(
        &self,
        platform_id: &str,
    ) -> Result<Option<ServerRecord>, DatabaseError>;
    async fn count_servers(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn create_channel(
        &self,
        channel: &NewChannel,
        server_id: i64,
    ) -> Result<i64, DatabaseError>;
    async fn get_channel(
        &self,
        platform_id: &str,
        name: &str,
        server_id: i64,
    ) -> Result<Option<ChannelRecord>, DatabaseError>;
    async fn count_channels(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<i64, DatabaseError>;
    async fn get_user_by_platform_id(
        &self,
        platform_id: &str,
    ) -> Result<Option<UserRecord>, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert keyed on the platform message id; a second write for the same
    /// id updates content, edit flag and attachments in place and never
    /// touches the original `created_at`.
    async fn upsert_message(&self, message: &NewMessage) -> Result<i64, DatabaseError>;
    async fn get_message_by_platform_id(
        &self,
        platform_id: &str,
    ) -> Result<Option<MessageRecord>, DatabaseError>;
    async fn count_messages(&self) -> Result<i64, DatabaseError>;
}
