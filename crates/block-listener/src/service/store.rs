//! # Block Store
//!
//! Record and pointer persistence on top of a `KeyValueStore`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::adapters::codec::{decode_pointer, decode_record, encode_pointer, encode_record};
use crate::domain::entities::{BlockPage, BlockRecord, LatestPointer};
use crate::domain::errors::ListenerError;
use crate::domain::pagination::{normalize_request, PageWindow};
use crate::domain::value_objects::{KeyLayout, ListenerConfig, Namespace};
use crate::ports::inbound::BlockCacheApi;
use crate::ports::outbound::{BatchOperation, KeyValueStore, OpenableStore, StoreSnapshot};

/// Durable cache of block records, one per `(source_id, sequence)`,
/// plus the latest pointer of every source.
pub struct BlockStore<KV: KeyValueStore> {
    kv: KV,
    config: ListenerConfig,
    closed: AtomicBool,
}

impl<KV: OpenableStore> BlockStore<KV> {
    /// Create `data_dir` if needed and open `<data_dir>/<db_file_name>`.
    pub fn open(data_dir: &Path, config: &ListenerConfig) -> Result<Self, ListenerError> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            ListenerError::storage_unavailable(data_dir.display().to_string(), e.to_string())
        })?;

        let path = data_dir.join(&config.db_file_name);
        let kv = KV::open(&path, config.sync_writes).map_err(|e| {
            ListenerError::storage_unavailable(path.display().to_string(), e.to_string())
        })?;

        Ok(Self::new(kv, config.clone()))
    }
}

impl<KV: KeyValueStore> BlockStore<KV> {
    pub fn new(kv: KV, config: ListenerConfig) -> Self {
        Self {
            kv,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Persist a record and advance its source's pointer in one batch.
    pub fn put(&self, record: &BlockRecord) -> Result<(), ListenerError> {
        let value = encode_record(record)?;
        let pointer = encode_pointer(&record.latest_pointer())?;

        self.kv.atomic_batch_write(vec![
            BatchOperation::put(
                Namespace::Blocks,
                KeyLayout::block_key(&record.source_id, record.sequence_number),
                value,
            ),
            BatchOperation::put(
                Namespace::Latest,
                KeyLayout::latest_key(&record.source_id),
                pointer,
            ),
        ])?;
        Ok(())
    }

    pub fn get(&self, source_id: &str, sequence: u64) -> Result<BlockRecord, ListenerError> {
        let bytes = self
            .kv
            .get(Namespace::Blocks, &KeyLayout::block_key(source_id, sequence))?
            .ok_or_else(|| ListenerError::BlockNotFound {
                source_id: source_id.to_string(),
                sequence,
            })?;
        Ok(decode_record(source_id, &bytes)?)
    }

    /// The stored pointer, or `None` if the source was never observed.
    pub fn find_latest(&self, source_id: &str) -> Result<Option<LatestPointer>, ListenerError> {
        match self
            .kv
            .get(Namespace::Latest, &KeyLayout::latest_key(source_id))?
        {
            Some(bytes) => Ok(Some(decode_pointer(source_id, &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_latest(&self, source_id: &str) -> Result<LatestPointer, ListenerError> {
        Ok(self
            .find_latest(source_id)?
            .unwrap_or_else(|| LatestPointer::unseen(source_id)))
    }

    pub fn list_page(
        &self,
        source_id: &str,
        page_size: u64,
        page_num: u64,
    ) -> Result<BlockPage, ListenerError> {
        let (page_size, page_num) =
            normalize_request(page_size, page_num, self.config.default_page_size);

        self.kv
            .read_snapshot(|snap: &dyn StoreSnapshot| -> Result<BlockPage, ListenerError> {
                let latest = snap
                    .get(Namespace::Latest, &KeyLayout::latest_key(source_id))?
                    .ok_or_else(|| ListenerError::SourceNotFound {
                        source_id: source_id.to_string(),
                    })?;
                let total = decode_pointer(source_id, &latest)?
                    .sequence_number
                    .saturating_add(1);

                let window = PageWindow::compute(total, page_size, page_num);
                let mut blocks = Vec::with_capacity(window.len() as usize);
                let mut missing = Vec::new();

                for sequence in window.descending() {
                    let key = KeyLayout::block_key(source_id, sequence);
                    match snap.get(Namespace::Blocks, &key)? {
                        Some(bytes) => match decode_record(source_id, &bytes) {
                            Ok(record) => blocks.push(record),
                            Err(e) => {
                                tracing::warn!(
                                    source = source_id,
                                    block = sequence,
                                    error = %e,
                                    "Undecodable block record in page"
                                );
                                missing.push(sequence);
                            }
                        },
                        None => {
                            tracing::warn!(
                                source = source_id,
                                block = sequence,
                                "Block record missing from page"
                            );
                            missing.push(sequence);
                        }
                    }
                }

                Ok(BlockPage {
                    blocks,
                    total,
                    page_size,
                    page_num,
                    has_more: window.has_more,
                    missing,
                })
            })
    }

    /// Flush and release the store. Subsequent calls are no-ops.
    pub fn close(&self) -> Result<(), ListenerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.kv.close()?;
        tracing::info!("Block store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// The underlying key-value store.
    pub fn kv(&self) -> &KV {
        &self.kv
    }
}

impl<KV: KeyValueStore> BlockCacheApi for BlockStore<KV> {
    fn get(&self, source_id: &str, sequence: u64) -> Result<BlockRecord, ListenerError> {
        BlockStore::get(self, source_id, sequence)
    }

    fn get_latest(&self, source_id: &str) -> Result<LatestPointer, ListenerError> {
        BlockStore::get_latest(self, source_id)
    }

    fn list_page(
        &self,
        source_id: &str,
        page_size: u64,
        page_num: u64,
    ) -> Result<BlockPage, ListenerError> {
        BlockStore::list_page(self, source_id, page_size, page_num)
    }
}
