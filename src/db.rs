pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::stores::{ChannelStore, MessageStore, ServerStore, UserStore};

pub mod error;
pub mod manager;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod stores;
