use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::sqlite::SqliteConnection;
use parking_lot::Mutex;
use tracing::debug;

use super::DatabaseError;
use super::models::{
    ChannelRecord, MessageRecord, NewChannel, NewMessage, NewServer, NewUser, ServerRecord,
    UserRecord,
};
use crate::db::schema::{channels, messages, servers, users};

diesel::define_sql_function! {
    fn last_insert_rowid() -> BigInt;
}

/// The one store connection, owned by the process and shared by every store.
/// SQLite serializes writers; the lock serializes our statements onto the
/// single handle.
pub(crate) type SharedConnection = Arc<Mutex<SqliteConnection>>;

/// Runs a store operation, retrying once if SQLite reports the database as
/// momentarily locked. Anything still failing after the retry is the
/// caller's problem.
fn with_conn<T, F>(conn: &SharedConnection, op: F) -> Result<T, DatabaseError>
where
    F: Fn(&mut SqliteConnection) -> Result<T, DatabaseError>,
{
    let mut guard = conn.lock();
    match op(&mut guard) {
        Err(err) if err.is_transient() => {
            debug!("retrying statement after transient store error: {err}");
            match op(&mut guard) {
                Err(DatabaseError::Transient(message)) => Err(DatabaseError::Fatal(message)),
                other => other,
            }
        }
        other => other,
    }
}

async fn run_blocking<T, F>(conn: &SharedConnection, op: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: Fn(&mut SqliteConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    let conn = conn.clone();
    tokio::task::spawn_blocking(move || with_conn(&conn, op))
        .await
        .map_err(|e| DatabaseError::Fatal(format!("store task failed: {e}")))?
}

#[derive(Insertable)]
#[diesel(table_name = channels)]
struct NewChannelRow<'a> {
    platform_id: &'a str,
    name: &'a str,
    server_id: i64,
}

pub struct SqliteServerStore {
    conn: SharedConnection,
}

impl SqliteServerStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl super::ServerStore for SqliteServerStore {
    async fn create_server(&self, server: &NewServer) -> Result<i64, DatabaseError> {
        let server = server.clone();
        run_blocking(&self.conn, move |conn| {
            conn.transaction(|conn| {
                diesel::insert_into(servers::table)
                    .values(&server)
                    .execute(conn)?;
                let id = diesel::select(last_insert_rowid()).get_result::<i64>(conn)?;
                Ok(id)
            })
        })
        .await
    }

    async fn get_server_by_platform_id(
        &self,
        platform_id: &str,
    ) -> Result<Option<ServerRecord>, DatabaseError> {
        let platform_id = platform_id.to_string();
        run_blocking(&self.conn, move |conn| {
            servers::table
                .filter(servers::platform_id.eq(&platform_id))
                .select(ServerRecord::as_select())
                .first::<ServerRecord>(conn)
                .optional()
                .map_err(DatabaseError::from)
        })
        .await
    }

    async fn count_servers(&self) -> Result<i64, DatabaseError> {
        run_blocking(&self.conn, move |conn| {
            servers::table
                .count()
                .get_result(conn)
                .map_err(DatabaseError::from)
        })
        .await
    }
}

pub struct SqliteChannelStore {
    conn: SharedConnection,
}

impl SqliteChannelStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl super::ChannelStore for SqliteChannelStore {
    async fn create_channel(
        &self,
        channel: &NewChannel,
        server_id: i64,
    ) -> Result<i64, DatabaseError> {
        let channel = channel.clone();
        run_blocking(&self.conn, move |conn| {
            let row = NewChannelRow {
                platform_id: &channel.platform_id,
                name: &channel.name,
                server_id,
            };
            conn.transaction(|conn| {
                diesel::insert_into(channels::table).values(row).execute(conn)?;
                let id = diesel::select(last_insert_rowid()).get_result::<i64>(conn)?;
                Ok(id)
            })
        })
        .await
    }

    async fn get_channel(
        &self,
        platform_id: &str,
        name: &str,
        server_id: i64,
    ) -> Result<Option<ChannelRecord>, DatabaseError> {
        let platform_id = platform_id.to_string();
        let name = name.to_string();
        run_blocking(&self.conn, move |conn| {
            channels::table
                .filter(channels::platform_id.eq(&platform_id))
                .filter(channels::name.eq(&name))
                .filter(channels::server_id.eq(server_id))
                .select(ChannelRecord::as_select())
                .first::<ChannelRecord>(conn)
                .optional()
                .map_err(DatabaseError::from)
        })
        .await
    }

    async fn count_channels(&self) -> Result<i64, DatabaseError> {
        run_blocking(&self.conn, move |conn| {
            channels::table
                .count()
                .get_result(conn)
                .map_err(DatabaseError::from)
        })
        .await
    }
}

pub struct SqliteUserStore {
    conn: SharedConnection,
}

impl SqliteUserStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl super::UserStore for SqliteUserStore {
    async fn create_user(&self, user: &NewUser) -> Result<i64, DatabaseError> {
        let user = user.clone();
        run_blocking(&self.conn, move |conn| {
            conn.transaction(|conn| {
                diesel::insert_into(users::table).values(&user).execute(conn)?;
                let id = diesel::select(last_insert_rowid()).get_result::<i64>(conn)?;
                Ok(id)
            })
        })
        .await
    }

    async fn get_user_by_platform_id(
        &self,
        platform_id: &str,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let platform_id = platform_id.to_string();
        run_blocking(&self.conn, move |conn| {
            users::table
                .filter(users::platform_id.eq(&platform_id))
                .select(UserRecord::as_select())
                .first::<UserRecord>(conn)
                .optional()
                .map_err(DatabaseError::from)
        })
        .await
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        run_blocking(&self.conn, move |conn| {
            users::table
                .count()
                .get_result(conn)
                .map_err(DatabaseError::from)
        })
        .await
    }
}

pub struct SqliteMessageStore {
    conn: SharedConnection,
}

impl SqliteMessageStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl super::MessageStore for SqliteMessageStore {
    async fn upsert_message(&self, message: &NewMessage) -> Result<i64, DatabaseError> {
        let message = message.clone();
        run_blocking(&self.conn, move |conn| {
            conn.transaction(|conn| {
                // Native upsert: a repeat of the same platform id (edit or
                // redelivery) updates in place and leaves created_at alone.
                diesel::insert_into(messages::table)
                    .values(&message)
                    .on_conflict(messages::platform_id)
                    .do_update()
                    .set((
                        messages::content.eq(&message.content),
                        messages::is_edited.eq(message.is_edited),
                        messages::attachments_url.eq(message.attachments_url.as_deref()),
                    ))
                    .execute(conn)?;
                let id = messages::table
                    .filter(messages::platform_id.eq(&message.platform_id))
                    .select(messages::id)
                    .first::<i64>(conn)?;
                Ok(id)
            })
        })
        .await
    }

    async fn get_message_by_platform_id(
        &self,
        platform_id: &str,
    ) -> Result<Option<MessageRecord>, DatabaseError> {
        let platform_id = platform_id.to_string();
        run_blocking(&self.conn, move |conn| {
            messages::table
                .filter(messages::platform_id.eq(&platform_id))
                .select(MessageRecord::as_select())
                .first::<MessageRecord>(conn)
                .optional()
                .map_err(DatabaseError::from)
        })
        .await
    }

    async fn count_messages(&self) -> Result<i64, DatabaseError> {
        run_blocking(&self.conn, move |conn| {
            messages::table
                .count()
                .get_result(conn)
                .map_err(DatabaseError::from)
        })
        .await
    }
}
