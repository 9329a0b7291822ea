use tracing::debug;

use crate::db::models::{NewChannel, NewServer, NewUser};
use crate::db::{ChannelStore, DatabaseError, DatabaseManager, ServerStore, UserStore};

use super::RecorderError;
use super::normalizer::NormalizedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIds {
    pub server_id: i64,
    pub channel_id: i64,
    pub author_id: i64,
}

/// Maps natural keys to local row ids, creating rows on first observation.
///
/// Creation is insert-first: the store's uniqueness constraint is the only
/// existence check, so two events racing to create the same entity both land
/// on the same row — whichever insert loses the race falls back to fetching
/// what the winner created. A lookup-before-insert here would reopen that
/// race; don't add one.
pub struct IdentityResolver<'a> {
    db: &'a DatabaseManager,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(db: &'a DatabaseManager) -> Self {
        Self { db }
    }

    /// Resolves all three entities of a normalized event. The server goes
    /// first; its local id completes the channel's natural key.
    pub async fn resolve(&self, event: &NormalizedEvent) -> Result<ResolvedIds, RecorderError> {
        let server_id = self.resolve_server(&event.server).await?;
        let channel_id = self.resolve_channel(&event.channel, server_id).await?;
        let author_id = self.resolve_user(&event.user).await?;
        Ok(ResolvedIds {
            server_id,
            channel_id,
            author_id,
        })
    }

    pub async fn resolve_server(&self, server: &NewServer) -> Result<i64, RecorderError> {
        let store = self.db.server_store();
        match store.create_server(server).await {
            Ok(row_id) => {
                debug!("created server {} as row {row_id}", server.platform_id);
                Ok(row_id)
            }
            Err(err) if err.is_constraint_violation() => store
                .get_server_by_platform_id(&server.platform_id)
                .await?
                .map(|row| row.id)
                .ok_or_else(|| missing_after_conflict("server", &server.platform_id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn resolve_channel(
        &self,
        channel: &NewChannel,
        server_id: i64,
    ) -> Result<i64, RecorderError> {
        let store = self.db.channel_store();
        match store.create_channel(channel, server_id).await {
            Ok(row_id) => {
                debug!("created channel {} as row {row_id}", channel.platform_id);
                Ok(row_id)
            }
            Err(err) if err.is_constraint_violation() => store
                .get_channel(&channel.platform_id, &channel.name, server_id)
                .await?
                .map(|row| row.id)
                .ok_or_else(|| {
                    missing_after_conflict(
                        "channel",
                        &format!("{}/{}/{server_id}", channel.platform_id, channel.name),
                    )
                }),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn resolve_user(&self, user: &NewUser) -> Result<i64, RecorderError> {
        let store = self.db.user_store();
        match store.create_user(user).await {
            Ok(row_id) => {
                debug!("created user {} as row {row_id}", user.platform_id);
                Ok(row_id)
            }
            Err(err) if err.is_constraint_violation() => store
                .get_user_by_platform_id(&user.platform_id)
                .await?
                .map(|row| row.id)
                .ok_or_else(|| missing_after_conflict("user", &user.platform_id)),
            Err(err) => Err(err.into()),
        }
    }
}

// Entity rows are never deleted, so a conflicting insert means the row is
// there; not finding it afterwards points at a broken store.
fn missing_after_conflict(kind: &str, natural_key: &str) -> RecorderError {
    RecorderError::Persistence(DatabaseError::Fatal(format!(
        "{kind} {natural_key} conflicted on insert but has no row"
    )))
}
