//! # Inbound Ports (Driving Ports)
//!
//! Read API exposed to query handlers and business services.

use crate::domain::entities::{BlockPage, BlockRecord, LatestPointer};
use crate::domain::errors::ListenerError;

/// Read access to the cached block history.
pub trait BlockCacheApi {
    /// Read one block summary.
    ///
    /// ## Errors
    ///
    /// - `BlockNotFound`: no record for `(source_id, sequence)`
    /// - `Closed`: the store has been shut down
    fn get(&self, source_id: &str, sequence: u64) -> Result<BlockRecord, ListenerError>;

    /// Most recent persisted sequence for a source.
    ///
    /// A source that was never observed yields [`LatestPointer::unseen`],
    /// not an error.
    fn get_latest(&self, source_id: &str) -> Result<LatestPointer, ListenerError>;

    /// One page of history, most recent first.
    ///
    /// `page_size` and `page_num` of 0 fall back to the configured defaults.
    /// The page is computed against a single read snapshot.
    ///
    /// ## Errors
    ///
    /// - `SourceNotFound`: the source was never observed
    fn list_page(
        &self,
        source_id: &str,
        page_size: u64,
        page_num: u64,
    ) -> Result<BlockPage, ListenerError>;
}
