use diesel::prelude::*;

use crate::db::schema::{channels, messages, servers, users};

/// A server (guild) row. `platform_id` is the natural key; `id` is the
/// store-generated local key every other table references.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = servers)]
pub struct ServerRecord {
    pub id: i64,
    pub platform_id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub member_count: Option<i64>,
    pub owner_platform_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = servers)]
pub struct NewServer {
    pub platform_id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub member_count: Option<i64>,
    pub owner_platform_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = channels)]
pub struct ChannelRecord {
    pub id: i64,
    pub platform_id: String,
    pub name: String,
    pub server_id: i64,
}

/// Candidate channel before its parent server has been resolved. The server
/// local id completes the natural key at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub platform_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct UserRecord {
    pub id: i64,
    pub platform_id: String,
    pub username: String,
    pub discriminator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub platform_id: String,
    pub username: String,
    pub discriminator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = messages)]
pub struct MessageRecord {
    pub id: i64,
    pub platform_id: String,
    pub created_at: String,
    pub content: String,
    pub author_id: i64,
    pub channel_id: i64,
    pub server_id: i64,
    pub is_edited: bool,
    pub attachments_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub platform_id: String,
    pub created_at: String,
    pub content: String,
    pub author_id: i64,
    pub channel_id: i64,
    pub server_id: i64,
    pub is_edited: bool,
    pub attachments_url: Option<String>,
}
