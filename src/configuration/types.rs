use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a persistence task does with a record it failed to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Log the failure and drop the single offending record.
    Recover,
    /// Report the failure to the pipeline owner, which tears the consumer down.
    Abort,
}

impl ErrorPolicy {
    pub fn from_exit_on_panic(exit_on_panic: bool) -> Self {
        if exit_on_panic {
            ErrorPolicy::Abort
        } else {
            ErrorPolicy::Recover
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `MAILGATE_DB_PATH` or the working directory when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub queue_capacity: usize,
    pub channel_prefix: String,
    /// 0 keeps fan-out unbounded
    pub max_tasks: usize,
    /// 0 disables the per-record upsert timeout
    pub upsert_timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            channel_prefix: String::from("mailgate"),
            max_tasks: 0,
            upsert_timeout_secs: 0,
        }
    }
}
