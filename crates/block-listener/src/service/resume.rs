use std::sync::Arc;

use super::store::BlockStore;
use crate::domain::errors::ListenerError;
use crate::ports::outbound::KeyValueStore;

/// Derives where a source's event stream should restart.
pub struct ResumeTracker<KV: KeyValueStore> {
    store: Arc<BlockStore<KV>>,
}

impl<KV: KeyValueStore> Clone for ResumeTracker<KV> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<KV: KeyValueStore> ResumeTracker<KV> {
    pub fn new(store: Arc<BlockStore<KV>>) -> Self {
        Self { store }
    }

    /// `latest + 1` for a known source, `0` for an unseen one.
    pub fn resume_from(&self, source_id: &str) -> Result<u64, ListenerError> {
        Ok(self
            .store
            .find_latest(source_id)?
            .map(|pointer| pointer.sequence_number.saturating_add(1))
            .unwrap_or(0))
    }
}
