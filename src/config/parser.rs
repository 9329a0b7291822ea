use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ConfigError;
use super::validator::looks_like_placeholder_token;

/// Everything the process needs to run. The config file is optional; every
/// field has a default and the bot token only ever comes from the
/// environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite store file.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Append file for per-event failure records.
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            error_log: default_error_log(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub bot_token: Option<SecretString>,
}

impl Config {
    /// Loads the config file when it exists, falls back to defaults when it
    /// does not, then applies environment overrides. Validation is separate
    /// so command-line overrides can land in between.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("BOT_TOKEN")
            && !token.is_empty()
        {
            self.auth.bot_token = Some(SecretString::from(token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(token) = self.auth.bot_token.as_ref() else {
            return Err(ConfigError::InvalidConfig(
                "missing environment variable BOT_TOKEN".to_string(),
            ));
        };
        if looks_like_placeholder_token(token.expose_secret()) {
            return Err(ConfigError::InvalidConfig(
                "BOT_TOKEN looks like a placeholder, set a real bot token".to_string(),
            ));
        }

        if self.database.path.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database.path cannot be empty".to_string(),
            ));
        }
        if self.logging.error_log.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "logging.error_log cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_database_path() -> String {
    "discord.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_error_log() -> PathBuf {
    PathBuf::from("logs/reporter.log")
}
