use super::types::*;
use crate::error_handling::types::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Application configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use mailgate::configuration::config::Config;
///
/// let config = Config::from_toml_str(r#"
///     instance_id = 3
///     whitelist = ["10.0.0.0/8"]
/// "#).unwrap();
/// assert_eq!(config.instance_id, 3);
/// assert_eq!(config.persistence.queue_capacity, 100);
/// ```
///
/// # Fields Overview
///
/// - `instance_id`: identifies the process group; scopes the persist channel name and is
/// stamped on every session record
/// - `exit_on_panic`: when `true` a failed record aborts the consumer instead of being dropped
/// - `whitelist`: IP or CIDR strings exempted from processing
/// - `database`: where the relational store lives
/// - `persistence`: queue capacity, channel naming, fan-out cap and upsert timeout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub instance_id: u64,
    pub exit_on_panic: bool,
    pub whitelist: Vec<String>,
    pub database: DatabaseConfig,
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_id: 1,
            exit_on_panic: false,
            whitelist: Vec::new(),
            database: DatabaseConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence.queue_capacity == 0 {
            return Err(ConfigError::NotInRange(String::from(
                "persistence.queue_capacity must be at least 1",
            )));
        }
        if self.persistence.channel_prefix.is_empty() {
            return Err(ConfigError::NotInRange(String::from(
                "persistence.channel_prefix must not be empty",
            )));
        }
        Ok(())
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::from_exit_on_panic(self.exit_on_panic)
    }

    /// Name of the shared queue that carries this instance group's session records.
    pub fn persist_channel(&self) -> String {
        format!(
            "{}-{}-session-persist",
            self.persistence.channel_prefix, self.instance_id
        )
    }

    pub fn max_tasks(&self) -> Option<usize> {
        match self.persistence.max_tasks {
            0 => None,
            n => Some(n),
        }
    }

    pub fn upsert_timeout(&self) -> Option<Duration> {
        match self.persistence.upsert_timeout_secs {
            0 => None,
            n => Some(Duration::from_secs(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.error_policy(), ErrorPolicy::Recover);
        assert_eq!(config.max_tasks(), None);
        assert_eq!(config.upsert_timeout(), None);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
instance_id = 7
exit_on_panic = true
whitelist = ["127.0.0.1", "10.0.0.0/8"]

[database]
path = "/var/lib/mailgate/db.sqlite3"

[persistence]
queue_capacity = 10
max_tasks = 4
upsert_timeout_secs = 30
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.instance_id, 7);
        assert_eq!(config.error_policy(), ErrorPolicy::Abort);
        assert_eq!(config.whitelist, vec!["127.0.0.1", "10.0.0.0/8"]);
        assert_eq!(
            config.database.path.as_deref(),
            Some(Path::new("/var/lib/mailgate/db.sqlite3"))
        );
        assert_eq!(config.persistence.queue_capacity, 10);
        assert_eq!(config.persistence.channel_prefix, "mailgate");
        assert_eq!(config.max_tasks(), Some(4));
        assert_eq!(config.upsert_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.persist_channel(), "mailgate-7-session-persist");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/mailgate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_bad_toml() {
        let err = Config::from_toml_str("instance_id = \"seven\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let err = Config::from_toml_str("[persistence]\nqueue_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::NotInRange(_)));
    }
}
