use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured default when set.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Plain-text append log for per-event failures. Operators read this file to
/// find out what was dropped and why; nothing is ever reported back to the
/// platform.
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records one failure, timestamped. Logging must never take the
    /// listener down, so file trouble is only traced.
    pub fn append(&self, message: &str) {
        error!("{message}");
        if let Err(err) = self.write_entry(message) {
            error!(
                "failed to write to '{}': {err}",
                self.path.display()
            );
        }
    }

    fn write_entry(&self, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let timestamp = Utc::now().to_rfc3339();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{timestamp} - {message}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    #[test]
    fn append_creates_the_file_and_prefixes_a_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("logs").join("reporter.log"));

        log.append("could not record message M1");

        let contents = fs::read_to_string(log.path()).unwrap();
        let line = contents.lines().next().unwrap();
        let (timestamp, rest) = line.split_once(" - ").expect("timestamp prefix");
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok(), "bad timestamp: {timestamp}");
        assert_eq!(rest, "could not record message M1");
    }

    #[test]
    fn append_accumulates_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("reporter.log"));

        log.append("first");
        log.append("second");

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
    }
}
