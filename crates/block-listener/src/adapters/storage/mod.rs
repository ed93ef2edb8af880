//! Storage Adapters
//!
//! Implementations of the `KeyValueStore` trait.

mod file;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb;

pub use file::FileBackedKVStore;
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::RocksDbStore;

use std::collections::HashMap;

use crate::domain::errors::KVStoreError;
use crate::domain::value_objects::Namespace;
use crate::ports::outbound::{BatchOperation, StoreSnapshot};

/// Store used by `BlockListener` unless another backend is chosen.
#[cfg(not(feature = "rocksdb"))]
pub type DefaultStore = FileBackedKVStore;
#[cfg(feature = "rocksdb")]
pub type DefaultStore = RocksDbStore;

/// Namespace -> key -> value, shared by the map-backed stores.
pub(crate) type Tables = HashMap<Namespace, HashMap<Vec<u8>, Vec<u8>>>;

pub(crate) fn apply_batch(tables: &mut Tables, operations: Vec<BatchOperation>) {
    for op in operations {
        match op {
            BatchOperation::Put {
                namespace,
                key,
                value,
            } => {
                tables.entry(namespace).or_default().insert(key, value);
            }
            BatchOperation::Delete { namespace, key } => {
                if let Some(table) = tables.get_mut(&namespace) {
                    table.remove(&key);
                }
            }
        }
    }
}

/// Read view over a borrowed `Tables` (held under a read lock).
pub(crate) struct TablesSnapshot<'a> {
    pub(crate) tables: &'a Tables,
}

impl StoreSnapshot for TablesSnapshot<'_> {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self
            .tables
            .get(&namespace)
            .and_then(|table| table.get(key))
            .cloned())
    }
}
