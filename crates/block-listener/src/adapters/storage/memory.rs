use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{apply_batch, Tables, TablesSnapshot};
use crate::domain::errors::KVStoreError;
use crate::domain::value_objects::Namespace;
use crate::ports::outbound::{BatchOperation, KeyValueStore, OpenableStore, StoreSnapshot};

/// In-memory key-value store for unit tests and embedding.
///
/// Batches are applied under one write lock, so readers never observe half
/// of a batch. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryKVStore {
    tables: RwLock<Tables>,
    closed: AtomicBool,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored in a namespace.
    pub fn len(&self, namespace: Namespace) -> usize {
        self.tables
            .read()
            .get(&namespace)
            .map(|table| table.len())
            .unwrap_or(0)
    }

    fn ensure_open(&self) -> Result<(), KVStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.ensure_open()?;
        Ok(self
            .tables
            .read()
            .get(&namespace)
            .and_then(|table| table.get(key))
            .cloned())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        apply_batch(&mut self.tables.write(), operations);
        Ok(())
    }

    fn read_snapshot<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn StoreSnapshot) -> Result<R, E>,
        E: From<KVStoreError>,
    {
        self.ensure_open()?;
        let tables = self.tables.read();
        f(&TablesSnapshot { tables: &tables })
    }

    fn close(&self) -> Result<(), KVStoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl OpenableStore for InMemoryKVStore {
    fn open(_path: &Path, _sync_writes: bool) -> Result<Self, KVStoreError> {
        Ok(Self::new())
    }
}
