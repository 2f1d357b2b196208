//! Configuration loader and validator for the journal backend.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub auth: Auth,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// SQLite file path or `sqlite:` URL.
    pub data_file: String,
    pub listen: String,
}

/// Session cookie settings, turned into an `AuthContext` at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auth {
    pub cookie_name: String,
    pub secret: String,
    pub session_max_age_secs: u64,
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_file must be non-empty"));
    }
    if cfg.app.listen.trim().is_empty() {
        return Err(ConfigError::Invalid("app.listen must be non-empty"));
    }
    if cfg.auth.cookie_name.trim().is_empty() {
        return Err(ConfigError::Invalid("auth.cookie_name must be non-empty"));
    }
    if cfg.auth.secret.trim().is_empty() {
        return Err(ConfigError::Invalid("auth.secret must be non-empty"));
    }
    if cfg.auth.session_max_age_secs == 0 {
        return Err(ConfigError::Invalid("auth.session_max_age_secs must be > 0"));
    }
    Ok(())
}

/// Sample configuration accepted by [`load`].
pub fn example() -> &'static str {
    r#"app:
  data_file: "./data/journal.db"
  listen: "127.0.0.1:1111"

auth:
  cookie_name: "journal3-session"
  secret: "CHANGE_ME"
  session_max_age_secs: 86400
"#
}
