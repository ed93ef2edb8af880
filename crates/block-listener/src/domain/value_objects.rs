//! # Value Objects
//!
//! Configuration and storage key layout for the block listener.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default database file (or directory, for RocksDB) inside the data dir.
pub const DEFAULT_DB_FILE: &str = "blocks.db";

/// Logical namespaces of the block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// `"<source_id>_<sequence>"` -> encoded `BlockRecord`
    Blocks,
    /// `source_id` -> encoded `LatestPointer`
    Latest,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Blocks, Namespace::Latest];

    /// Bucket / column family name.
    pub fn name(self) -> &'static str {
        match self {
            Namespace::Blocks => "blocks",
            Namespace::Latest => "latest_blocks",
        }
    }
}

/// Storage key construction.
pub struct KeyLayout;

impl KeyLayout {
    pub fn block_key(source_id: &str, sequence: u64) -> Vec<u8> {
        format!("{}_{}", source_id, sequence).into_bytes()
    }

    pub fn latest_key(source_id: &str) -> Vec<u8> {
        source_id.as_bytes().to_vec()
    }
}

/// Reject ids that would make keys ambiguous or unreadable in logs.
pub fn validate_source_id(source_id: &str) -> bool {
    !source_id.is_empty() && !source_id.chars().any(char::is_whitespace)
}

/// Bounded reconnect policy for a source's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive reopen attempts before a source is abandoned.
    /// `0` exits on the first stream termination.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    /// Never reopen a terminated stream.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Configuration for the block listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Database file name inside the data directory (default: `blocks.db`).
    pub db_file_name: String,
    /// Page size used when a caller passes 0 (default: 10).
    pub default_page_size: u64,
    /// fsync every committed batch (default: true).
    pub sync_writes: bool,
    /// How long `close()` waits for listening tasks (default: 5s).
    pub shutdown_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            db_file_name: DEFAULT_DB_FILE.to_string(),
            default_page_size: 10,
            sync_writes: true,
            shutdown_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smaller timeouts and no fsync.
    pub fn for_testing() -> Self {
        Self {
            sync_writes: false,
            shutdown_timeout: Duration::from_secs(2),
            reconnect: ReconnectPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::from_millis(50),
            },
            ..Self::default()
        }
    }

    pub fn with_db_file_name(mut self, name: impl Into<String>) -> Self {
        self.db_file_name = name.into();
        self
    }

    pub fn with_default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Apply `BLOCK_LISTENER_*` environment overrides on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by `from_env`).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("BLOCK_LISTENER_DB_FILE") {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "BLOCK_LISTENER_DB_FILE",
                    value: name,
                });
            }
            self.db_file_name = name;
        }
        if let Some(size) = parse_var(&lookup, "BLOCK_LISTENER_DEFAULT_PAGE_SIZE")? {
            self = self.with_default_page_size(size);
        }
        if let Some(sync) = parse_var(&lookup, "BLOCK_LISTENER_SYNC_WRITES")? {
            self.sync_writes = sync;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BLOCK_LISTENER_SHUTDOWN_TIMEOUT_SECS")? {
            self.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var(&lookup, "BLOCK_LISTENER_RECONNECT_ATTEMPTS")? {
            self.reconnect.max_attempts = attempts;
        }
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
