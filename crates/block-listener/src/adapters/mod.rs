//! # Adapters Module
//!
//! - `storage`: `KeyValueStore` backends (file log, RocksDB, memory)
//! - `codec`: JSON encoding of persisted values
//! - `ledger`: in-process `BlockEventSource`

pub mod codec;
pub mod ledger;
pub mod storage;

pub use ledger::InMemoryLedger;
pub use storage::{DefaultStore, FileBackedKVStore, InMemoryKVStore};
#[cfg(feature = "rocksdb")]
pub use storage::RocksDbStore;
