//! # Domain Entities
//!
//! - `BlockEvent` - what a ledger event stream delivers
//! - `BlockRecord` - compact, immutable summary persisted per observed block
//! - `LatestPointer` - per-source resume bookkeeping
//! - `BlockPage` - one page of cached history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::hashing::compute_block_hash;

/// Header fields of a delivered block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub previous_hash: Vec<u8>,
    pub data_hash: Vec<u8>,
}

/// A block as delivered by a [`BlockEventSource`](crate::ports::outbound::BlockEventSource).
///
/// `data` holds one opaque envelope per transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub header: BlockHeader,
    pub data: Vec<Vec<u8>>,
}

impl BlockEvent {
    pub fn new(header: BlockHeader, data: Vec<Vec<u8>>) -> Self {
        Self { header, data }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn tx_count(&self) -> usize {
        self.data.len()
    }
}

/// Persisted summary of one block.
///
/// The source id is part of the storage key, not of the encoded value, so it
/// is skipped during serialization and restored by the store on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(skip)]
    pub source_id: String,
    #[serde(rename = "block_num")]
    pub sequence_number: u64,
    pub block_hash: String,
    pub data_hash: String,
    pub prev_hash: String,
    pub tx_count: usize,
    #[serde(rename = "save_time")]
    pub saved_at: DateTime<Utc>,
}

impl BlockRecord {
    /// Build the record for a delivered block, hashing its header.
    pub fn from_event(source_id: &str, event: &BlockEvent, saved_at: DateTime<Utc>) -> Self {
        let header = &event.header;
        Self {
            source_id: source_id.to_string(),
            sequence_number: header.number,
            block_hash: compute_block_hash(header.number, &header.previous_hash, &header.data_hash),
            data_hash: hex::encode(&header.data_hash),
            prev_hash: hex::encode(&header.previous_hash),
            tx_count: event.tx_count(),
            saved_at,
        }
    }

    /// Header hash recomputed from the stored sequence number and hashes.
    ///
    /// `None` if either stored hash is not valid hex.
    pub fn recomputed_hash(&self) -> Option<String> {
        let (Ok(prev), Ok(data)) = (hex::decode(&self.prev_hash), hex::decode(&self.data_hash))
        else {
            return None;
        };
        Some(compute_block_hash(self.sequence_number, &prev, &data))
    }

    /// True when the stored `block_hash` matches the recomputed one.
    pub fn verify_hash(&self) -> bool {
        self.recomputed_hash().as_deref() == Some(self.block_hash.as_str())
    }

    /// The pointer that must be written alongside this record.
    pub fn latest_pointer(&self) -> LatestPointer {
        LatestPointer {
            source_id: self.source_id.clone(),
            sequence_number: self.sequence_number,
            saved_at: self.saved_at,
        }
    }
}

/// Most recently persisted sequence number for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    #[serde(skip)]
    pub source_id: String,
    #[serde(rename = "block_num")]
    pub sequence_number: u64,
    #[serde(rename = "save_time")]
    pub saved_at: DateTime<Utc>,
}

impl LatestPointer {
    /// Empty pointer returned for a source that was never observed.
    pub fn unseen(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            sequence_number: 0,
            saved_at: DateTime::<Utc>::default(),
        }
    }
}

/// One page of cached history, most recent block first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockPage {
    pub blocks: Vec<BlockRecord>,
    pub total: u64,
    pub page_size: u64,
    pub page_num: u64,
    pub has_more: bool,
    /// Sequence numbers inside the window whose record was absent or
    /// could not be decoded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<u64>,
}

impl BlockPage {
    /// True when every sequence number in the window was returned.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.blocks.iter().map(|b| b.sequence_number).collect()
    }
}
