//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the listener requires from its host: a transactional
//! key-value store, a ledger block event source, and a clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::domain::entities::BlockEvent;
use crate::domain::errors::{KVStoreError, StreamError};
use crate::domain::value_objects::Namespace;

/// Abstract interface for namespaced key-value persistence.
///
/// Production: `FileBackedKVStore`, or `RocksDbStore` with the `rocksdb` feature.
/// Testing: `InMemoryKVStore`.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Get a value by key.
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Run `f` against a consistent read-only view.
    ///
    /// Writes committed while `f` runs are not visible to it.
    fn read_snapshot<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn StoreSnapshot) -> Result<R, E>,
        E: From<KVStoreError>;

    /// Flush and release the underlying handle. Calling it twice is a no-op.
    fn close(&self) -> Result<(), KVStoreError>;
}

/// A store that can be opened at a filesystem location.
pub trait OpenableStore: KeyValueStore + Sized {
    fn open(path: &Path, sync_writes: bool) -> Result<Self, KVStoreError>;
}

/// Consistent read view handed to [`KeyValueStore::read_snapshot`].
pub trait StoreSnapshot {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put {
        namespace: Namespace,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete { namespace: Namespace, key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(namespace: Namespace, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            namespace,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(namespace: Namespace, key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete {
            namespace,
            key: key.into(),
        }
    }
}

/// Stream of blocks delivered by a [`BlockEventSource`].
pub type BlockEventStream = Pin<Box<dyn Stream<Item = Result<BlockEvent, StreamError>> + Send>>;

/// A per-organization ledger block event feed.
///
/// Implementations wrap whatever gateway connection delivers blocks; the
/// listener only decides where the stream starts.
#[async_trait]
pub trait BlockEventSource: Send + Sync {
    /// Open the feed so that the first delivered block is `start_block`.
    async fn open(&self, start_block: u64) -> Result<BlockEventStream, StreamError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default time source using the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
