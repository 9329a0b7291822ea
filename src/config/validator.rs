use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Catches tokens copied straight out of documentation before they reach
/// the platform and get the account flagged.
pub(super) fn looks_like_placeholder_token(token: &str) -> bool {
    let lowered = token.to_lowercase();
    ["your-token", "your_token", "changeme", "example", "xxx"]
        .iter()
        .any(|placeholder| lowered.contains(placeholder))
}
