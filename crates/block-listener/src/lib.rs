//! # Block Listener
//!
//! Subscribes to per-organization ledger block-event streams and keeps a
//! durable local cache of what it has seen.
//!
//! For every delivered block the listener persists a compact `BlockRecord`
//! (sequence number, header hashes, transaction count, save time) together
//! with the source's latest pointer, in one atomic batch. On restart each
//! source resumes at `latest + 1`, so the cache neither duplicates nor skips
//! blocks across process lifetimes.
//!
//! ```text
//! BlockEventSource ──events──→ SubscriptionManager ──put──→ BlockStore ──→ KeyValueStore
//!   (per source)               (one task per source)        (records +     (blocks.db)
//!                                                            pointers)
//!                                                                ↑
//!                                  get / get_latest / list_page ─┘
//! ```
//!
//! ## Block hash
//!
//! `block_hash = hex(SHA-256(DER(SEQUENCE { INTEGER number,
//! OCTET STRING previous_hash, OCTET STRING data_hash })))`
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - entities, hashing, pagination, configuration, errors
//! - `ports/` - `BlockCacheApi` (inbound), store / event source / clock (outbound)
//! - `adapters/` - file, RocksDB and in-memory stores; JSON codec; in-memory ledger
//! - `service/` - `BlockStore`, `ResumeTracker`, `SubscriptionManager`, `BlockListener`
//!
//! ## Usage
//!
//! ```ignore
//! use block_listener::{BlockListener, InMemoryLedger, ListenerConfig};
//! use std::sync::Arc;
//!
//! let listener: BlockListener = BlockListener::new(ListenerConfig::from_env()?);
//! listener.init_once("./data").await?;
//! listener.add_source("org1", Arc::new(InMemoryLedger::with_chain(10)))?;
//!
//! let page = listener.list_page("org1", 10, 1)?;
//! listener.close().await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;


// Re-export key types for convenience
pub use adapters::{DefaultStore, FileBackedKVStore, InMemoryKVStore, InMemoryLedger};
#[cfg(feature = "rocksdb")]
pub use adapters::RocksDbStore;
pub use domain::entities::{BlockEvent, BlockHeader, BlockPage, BlockRecord, LatestPointer};
pub use domain::errors::{KVStoreError, ListenerError, SerializationError, StreamError};
pub use domain::hashing::compute_block_hash;
pub use domain::value_objects::{ConfigError, ListenerConfig, ReconnectPolicy, DEFAULT_DB_FILE};
pub use ports::inbound::BlockCacheApi;
pub use ports::outbound::{
    BlockEventSource, BlockEventStream, KeyValueStore, OpenableStore, SystemTimeSource, TimeSource,
};
pub use service::{BlockListener, BlockStore, SourceStatus, TaskExit};
