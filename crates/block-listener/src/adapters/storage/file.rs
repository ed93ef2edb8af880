//! # File-Backed Store
//!
//! A single-file, append-only batch log replayed into memory on open.
//!
//! ```text
//! [magic: 8 bytes]
//! [len: u32 LE][crc32: u32 LE][bincode(Vec<BatchOperation>)]
//! [len: u32 LE][crc32: u32 LE][bincode(Vec<BatchOperation>)]
//! ...
//! ```
//!
//! One frame per `atomic_batch_write`. A frame that runs past end-of-file is
//! a torn tail from a crash mid-write and is truncated away on open. A
//! complete frame that fails its checksum is skipped by its length; the
//! frames after it still replay.

use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{apply_batch, Tables, TablesSnapshot};
use crate::domain::errors::KVStoreError;
use crate::domain::value_objects::Namespace;
use crate::ports::outbound::{BatchOperation, KeyValueStore, OpenableStore, StoreSnapshot};

const MAGIC: &[u8; 8] = b"BLKLOG\x00\x01";
const FRAME_HEADER_LEN: usize = 8;

/// File-backed key-value store holding an exclusive lock on its file.
pub struct FileBackedKVStore {
    path: PathBuf,
    sync_writes: bool,
    state: RwLock<Option<LogState>>,
}

struct LogState {
    tables: Tables,
    file: File,
    /// Offset just past the last complete frame.
    len: u64,
}

impl FileBackedKVStore {
    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(path: &Path) -> Result<File, KVStoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(KVStoreError::io)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(KVStoreError::io)?;

        file.try_lock_exclusive()
            .map_err(|e| KVStoreError::Locked {
                message: format!("{} is in use: {}", path.display(), e),
            })?;

        Ok(file)
    }

    fn replay(path: &Path, file: &mut File) -> Result<(Tables, u64), KVStoreError> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(KVStoreError::io)?;

        if bytes.is_empty() {
            file.write_all(MAGIC).map_err(KVStoreError::io)?;
            file.sync_all().map_err(KVStoreError::io)?;
            return Ok((Tables::new(), MAGIC.len() as u64));
        }

        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(KVStoreError::CorruptionError {
                message: format!("{} is not a block cache file", path.display()),
            });
        }

        let mut tables = Tables::new();
        let mut cursor = MAGIC.len();
        let mut frames = 0usize;
        let mut skipped = 0usize;

        while cursor < bytes.len() {
            match decode_frame(&bytes, cursor) {
                Frame::Batch { operations, next } => {
                    apply_batch(&mut tables, operations);
                    cursor = next;
                    frames += 1;
                }
                Frame::Corrupt { next } => {
                    tracing::warn!(
                        path = %path.display(),
                        offset = cursor,
                        frame_bytes = next - cursor,
                        "Skipping corrupt batch in block cache log"
                    );
                    cursor = next;
                    skipped += 1;
                }
                Frame::Torn => break,
            }
        }

        if cursor < bytes.len() {
            tracing::warn!(
                path = %path.display(),
                valid_bytes = cursor,
                discarded_bytes = bytes.len() - cursor,
                "Truncating incomplete tail of block cache log"
            );
            file.set_len(cursor as u64).map_err(KVStoreError::io)?;
            file.sync_all().map_err(KVStoreError::io)?;
        }

        tracing::debug!(path = %path.display(), frames, skipped, "Replayed block cache log");
        Ok((tables, cursor as u64))
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&LogState) -> Result<R, KVStoreError>,
    ) -> Result<R, KVStoreError> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(KVStoreError::Closed)?;
        f(state)
    }
}

enum Frame {
    Batch {
        operations: Vec<BatchOperation>,
        next: usize,
    },
    /// Complete frame whose payload does not check out.
    Corrupt { next: usize },
    /// Header or payload runs past end-of-file.
    Torn,
}

fn decode_frame(bytes: &[u8], offset: usize) -> Frame {
    let Some(header) = bytes.get(offset..offset + FRAME_HEADER_LEN) else {
        return Frame::Torn;
    };
    let (len, crc) = header.split_at(4);
    let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    let crc = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);

    let start = offset + FRAME_HEADER_LEN;
    let next = start + len;
    let Some(payload) = bytes.get(start..next) else {
        return Frame::Torn;
    };
    if crc32fast::hash(payload) != crc {
        return Frame::Corrupt { next };
    }

    match bincode::deserialize(payload) {
        Ok(operations) => Frame::Batch { operations, next },
        Err(_) => Frame::Corrupt { next },
    }
}

fn encode_frame(operations: &[BatchOperation]) -> Result<Vec<u8>, KVStoreError> {
    let payload = bincode::serialize(operations).map_err(|e| KVStoreError::IOError {
        message: format!("failed to encode batch: {e}"),
    })?;
    let len = u32::try_from(payload.len()).map_err(|_| KVStoreError::IOError {
        message: format!("batch of {} bytes is too large", payload.len()),
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.with_state(|state| {
            Ok(state
                .tables
                .get(&namespace)
                .and_then(|table| table.get(key))
                .cloned())
        })
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        if operations.is_empty() {
            return self.with_state(|_| Ok(()));
        }
        let frame = encode_frame(&operations)?;

        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(KVStoreError::Closed)?;

        let written = state
            .file
            .seek(SeekFrom::Start(state.len))
            .and_then(|_| state.file.write_all(&frame))
            .and_then(|_| {
                if self.sync_writes {
                    state.file.sync_data()
                } else {
                    Ok(())
                }
            });

        if let Err(e) = written {
            // Drop any partial frame so later batches stay readable.
            if let Err(truncate_err) = state.file.set_len(state.len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "Failed to roll back partial batch"
                );
            }
            return Err(KVStoreError::io(e));
        }

        state.len += frame.len() as u64;
        apply_batch(&mut state.tables, operations);
        Ok(())
    }

    fn read_snapshot<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn StoreSnapshot) -> Result<R, E>,
        E: From<KVStoreError>,
    {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(KVStoreError::Closed)?;
        f(&TablesSnapshot {
            tables: &state.tables,
        })
    }

    fn close(&self) -> Result<(), KVStoreError> {
        let Some(state) = self.state.write().take() else {
            return Ok(());
        };
        let synced = state.file.sync_all().map_err(KVStoreError::io);
        // Dropping the handle releases the lock.
        drop(state);
        synced
    }
}

impl OpenableStore for FileBackedKVStore {
    fn open(path: &Path, sync_writes: bool) -> Result<Self, KVStoreError> {
        let mut file = Self::lock_file(path)?;
        let (tables, len) = Self::replay(path, &mut file)?;

        tracing::info!(
            path = %path.display(),
            bytes = len,
            "Opened block cache file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sync_writes,
            state: RwLock::new(Some(LogState { tables, file, len })),
        })
    }
}
