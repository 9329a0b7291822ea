pub use self::parser::{AuthConfig, Config, DatabaseConfig, LoggingConfig};
pub use self::validator::ConfigError;

mod parser;
mod validator;
