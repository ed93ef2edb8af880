//! # Domain Errors
//!
//! Error types for the block listener.
//!
//! `ListenerError` is `Clone` so that a single initialization result can be
//! handed to every concurrent `init_once` caller.

use thiserror::Error;

/// Errors surfaced by the listener's public operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The data directory or database could not be created or opened.
    #[error("Storage unavailable at {path}: {message}")]
    StorageUnavailable { path: String, message: String },

    /// `add_source` was called twice for the same source.
    #[error("Source already registered: {source_id}")]
    AlreadyRegistered { source_id: String },

    /// No block has ever been persisted for this source.
    #[error("Source not found: {source_id}")]
    SourceNotFound { source_id: String },

    /// The source exists but this sequence number was never persisted.
    #[error("Block {sequence} not found for source {source_id}")]
    BlockNotFound { source_id: String, sequence: u64 },

    /// Source identifiers must be non-empty and free of whitespace.
    #[error("Invalid source id: {0:?}")]
    InvalidSourceId(String),

    /// Event stream setup or delivery failed.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// A record could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    Encoding(#[from] SerializationError),

    /// The underlying transaction failed; nothing was written.
    #[error("Database error: {0}")]
    Database(KVStoreError),

    /// `init_once` has not completed yet.
    #[error("Block listener not initialized")]
    NotInitialized,

    /// The listener (or its store) has been shut down.
    #[error("Block listener closed")]
    Closed,
}

impl ListenerError {
    /// True for both "source never seen" and "sequence not produced".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ListenerError::SourceNotFound { .. } | ListenerError::BlockNotFound { .. }
        )
    }

    pub(crate) fn storage_unavailable(
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ListenerError::StorageUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<KVStoreError> for ListenerError {
    fn from(err: KVStoreError) -> Self {
        match err {
            KVStoreError::Closed => ListenerError::Closed,
            other => ListenerError::Database(other),
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
    /// Another handle holds the database lock.
    #[error("KV store locked: {message}")]
    Locked { message: String },
    /// The store handle was released.
    #[error("KV store closed")]
    Closed,
}

impl KVStoreError {
    pub(crate) fn io(err: impl std::fmt::Display) -> Self {
        KVStoreError::IOError {
            message: err.to_string(),
        }
    }
}

/// Record (de)serialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

impl SerializationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by a block event source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The stream could not be opened at the requested start block.
    #[error("Failed to open block events from {start}: {message}")]
    OpenFailed { start: u64, message: String },
    /// The stream failed after delivering some events.
    #[error("Block event delivery failed: {message}")]
    Delivery { message: String },
}
