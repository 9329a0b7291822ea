use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "discord-reporter")]
#[command(about = "Discord bot that records server messages into SQLite", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: PathBuf,

    #[arg(
        short = 'p',
        long,
        help = "path to the SQLite database, overrides the config file"
    )]
    pub database_path: Option<String>,

    #[arg(long, help = "path to the error log file, overrides the config file")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, help = "display debug logs")]
    pub debug: bool,
}

impl Cli {
    /// Command-line flags win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.database_path {
            config.database.path = path.clone();
        }
        if let Some(path) = &self.log_file {
            config.logging.error_log = path.clone();
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_the_config_untouched() {
        let cli = Cli::parse_from(["discord-reporter"]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.database.path, "discord.db");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn flags_override_the_config() {
        let cli = Cli::parse_from([
            "discord-reporter",
            "--database-path",
            "/tmp/other.db",
            "--log-file",
            "/tmp/errors.log",
            "--debug",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.database.path, "/tmp/other.db");
        assert_eq!(config.logging.error_log, PathBuf::from("/tmp/errors.log"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn short_database_flag_matches_the_long_one() {
        let cli = Cli::parse_from(["discord-reporter", "-p", "short.db"]);
        assert_eq!(cli.database_path.as_deref(), Some("short.db"));
    }
}
