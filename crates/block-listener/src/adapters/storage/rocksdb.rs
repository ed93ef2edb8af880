//! # RocksDB Store
//!
//! Column-family backed store, one column family per `Namespace`.
//! The database lives in a directory at the configured path.

use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, WriteOptions, DB};
use std::path::{Path, PathBuf};

use crate::domain::errors::KVStoreError;
use crate::domain::value_objects::Namespace;
use crate::ports::outbound::{BatchOperation, KeyValueStore, OpenableStore, StoreSnapshot};

pub struct RocksDbStore {
    path: PathBuf,
    sync_writes: bool,
    db: RwLock<Option<DB>>,
}

impl RocksDbStore {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn column_family(db: &DB, namespace: Namespace) -> Result<&ColumnFamily, KVStoreError> {
    db.cf_handle(namespace.name())
        .ok_or_else(|| KVStoreError::CorruptionError {
            message: format!("missing column family {}", namespace.name()),
        })
}

fn rocks_error(op: &str, e: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {op} failed: {e}"),
    }
}

struct RocksSnapshot<'a> {
    db: &'a DB,
    snapshot: rocksdb::Snapshot<'a>,
}

impl StoreSnapshot for RocksSnapshot<'_> {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let cf = column_family(self.db, namespace)?;
        self.snapshot
            .get_cf(cf, key)
            .map_err(|e| rocks_error("snapshot get", e))
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;
        let cf = column_family(db, namespace)?;
        db.get_cf(cf, key).map_err(|e| rocks_error("get", e))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;
        let mut batch = WriteBatch::default();

        for op in operations {
            match op {
                BatchOperation::Put {
                    namespace,
                    key,
                    value,
                } => batch.put_cf(column_family(db, namespace)?, key, value),
                BatchOperation::Delete { namespace, key } => {
                    batch.delete_cf(column_family(db, namespace)?, key)
                }
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        db.write_opt(batch, &write_opts)
            .map_err(|e| rocks_error("batch write", e))
    }

    fn read_snapshot<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn StoreSnapshot) -> Result<R, E>,
        E: From<KVStoreError>,
    {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;
        let view = RocksSnapshot {
            db,
            snapshot: db.snapshot(),
        };
        f(&view)
    }

    fn close(&self) -> Result<(), KVStoreError> {
        let Some(db) = self.db.write().take() else {
            return Ok(());
        };
        let flushed = db.flush().map_err(|e| rocks_error("flush", e));
        drop(db);
        flushed
    }
}

impl OpenableStore for RocksDbStore {
    fn open(path: &Path, sync_writes: bool) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Namespace::ALL
            .iter()
            .map(|ns| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(ns.name(), cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors).map_err(|e| {
            let message = format!("Failed to open RocksDB at {}: {}", path.display(), e);
            if e.to_string().to_lowercase().contains("lock") {
                KVStoreError::Locked { message }
            } else {
                KVStoreError::IOError { message }
            }
        })?;

        tracing::info!(path = %path.display(), "Opened RocksDB block cache");

        Ok(Self {
            path: path.to_path_buf(),
            sync_writes,
            db: RwLock::new(Some(db)),
        })
    }
}
