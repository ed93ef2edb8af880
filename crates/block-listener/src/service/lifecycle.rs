//! # Block Listener
//!
//! Composition root: owns the store and the subscription manager, and
//! gates every operation on initialization and shutdown state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::store::BlockStore;
use super::subscription::{SourceStatus, SubscriptionManager};
use crate::adapters::storage::DefaultStore;
use crate::domain::entities::{BlockPage, BlockRecord, LatestPointer};
use crate::domain::errors::ListenerError;
use crate::domain::value_objects::ListenerConfig;
use crate::ports::inbound::BlockCacheApi;
use crate::ports::outbound::{BlockEventSource, OpenableStore, SystemTimeSource, TimeSource};

struct Running<KV: OpenableStore> {
    data_dir: PathBuf,
    store: Arc<BlockStore<KV>>,
    subscriptions: SubscriptionManager<KV>,
}

/// Block event listener with its local block cache.
///
/// Create one per process (or per data directory), call [`init_once`],
/// register sources with [`add_source`], and call [`close`] on shutdown.
///
/// [`init_once`]: BlockListener::init_once
/// [`add_source`]: BlockListener::add_source
/// [`close`]: BlockListener::close
pub struct BlockListener<KV: OpenableStore = DefaultStore> {
    config: ListenerConfig,
    clock: Arc<dyn TimeSource>,
    running: OnceCell<Result<Arc<Running<KV>>, ListenerError>>,
    closed: AtomicBool,
}

impl<KV: OpenableStore> BlockListener<KV> {
    pub fn new(config: ListenerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemTimeSource))
    }

    pub fn with_clock(config: ListenerConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            clock,
            running: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Open the store under `data_dir`.
    ///
    /// Only the first call does any work. Concurrent callers wait for it and
    /// all observe its result, and later calls return that same result
    /// whatever `data_dir` they pass.
    pub async fn init_once(&self, data_dir: impl AsRef<Path>) -> Result<(), ListenerError> {
        if self.is_closed() {
            return Err(ListenerError::Closed);
        }
        let data_dir = data_dir.as_ref().to_path_buf();

        let result = self
            .running
            .get_or_init(|| self.start(data_dir))
            .await;

        if self.is_closed() {
            return Err(ListenerError::Closed);
        }
        result.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    async fn start(&self, data_dir: PathBuf) -> Result<Arc<Running<KV>>, ListenerError> {
        let config = self.config.clone();
        let dir = data_dir.clone();
        let store = tokio::task::spawn_blocking(move || BlockStore::<KV>::open(&dir, &config))
            .await
            .map_err(|e| {
                ListenerError::storage_unavailable(data_dir.display().to_string(), e.to_string())
            })?;

        let store = match store {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(path = %data_dir.display(), error = %e, "Failed to open block store");
                return Err(e);
            }
        };

        let subscriptions = SubscriptionManager::new(
            Arc::clone(&store),
            Arc::clone(&self.clock),
            self.config.reconnect.clone(),
        );

        tracing::info!(path = %data_dir.display(), "Block listener initialized");
        Ok(Arc::new(Running {
            data_dir,
            store,
            subscriptions,
        }))
    }

    fn running(&self) -> Result<&Running<KV>, ListenerError> {
        if self.is_closed() {
            return Err(ListenerError::Closed);
        }
        match self.running.get() {
            Some(Ok(running)) => Ok(running.as_ref()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(ListenerError::NotInitialized),
        }
    }

    /// Start listening to `source` under `source_id`.
    ///
    /// Spawns the listening task, so it must be called from within a tokio
    /// runtime.
    pub fn add_source(
        &self,
        source_id: &str,
        source: Arc<dyn BlockEventSource>,
    ) -> Result<(), ListenerError> {
        self.running()?.subscriptions.add_source(source_id, source)
    }

    pub fn get(&self, source_id: &str, sequence: u64) -> Result<BlockRecord, ListenerError> {
        self.running()?.store.get(source_id, sequence)
    }

    pub fn get_latest(&self, source_id: &str) -> Result<LatestPointer, ListenerError> {
        self.running()?.store.get_latest(source_id)
    }

    pub fn list_page(
        &self,
        source_id: &str,
        page_size: u64,
        page_num: u64,
    ) -> Result<BlockPage, ListenerError> {
        self.running()?.store.list_page(source_id, page_size, page_num)
    }

    pub fn sources(&self) -> Result<Vec<SourceStatus>, ListenerError> {
        Ok(self.running()?.subscriptions.sources())
    }

    pub fn data_dir(&self) -> Option<&Path> {
        match self.running.get() {
            Some(Ok(running)) => Some(running.data_dir.as_path()),
            _ => None,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop every listening task and close the store.
    ///
    /// Tasks get `shutdown_timeout` to finish their current write before
    /// they are aborted. Calling `close` again is a no-op.
    pub async fn close(&self) -> Result<(), ListenerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Waits for an in-flight `init_once`; otherwise seals the cell so a
        // later `init_once` cannot open the store.
        let running = self
            .running
            .get_or_init(|| async { Err(ListenerError::Closed) })
            .await;
        let Ok(running) = running else {
            return Ok(());
        };

        let aborted = running
            .subscriptions
            .shutdown(self.config.shutdown_timeout)
            .await;

        let store = Arc::clone(&running.store);
        tokio::task::spawn_blocking(move || store.close())
            .await
            .map_err(|e| {
                ListenerError::storage_unavailable(
                    running.data_dir.display().to_string(),
                    e.to_string(),
                )
            })??;

        tracing::info!(aborted, "Block listener closed");
        Ok(())
    }
}

impl<KV: OpenableStore> BlockCacheApi for BlockListener<KV> {
    fn get(&self, source_id: &str, sequence: u64) -> Result<BlockRecord, ListenerError> {
        BlockListener::get(self, source_id, sequence)
    }

    fn get_latest(&self, source_id: &str) -> Result<LatestPointer, ListenerError> {
        BlockListener::get_latest(self, source_id)
    }

    fn list_page(
        &self,
        source_id: &str,
        page_size: u64,
        page_num: u64,
    ) -> Result<BlockPage, ListenerError> {
        BlockListener::list_page(self, source_id, page_size, page_num)
    }
}
