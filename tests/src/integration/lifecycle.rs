//! # Listener Lifecycle
//!
//! `init_once` runs exactly once per listener, a data directory has one
//! owner at a time, and `close` is bounded and idempotent.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use block_listener::{
        BlockEventSource, BlockEventStream, BlockListener, FileBackedKVStore, InMemoryLedger,
        ListenerError, StreamError, DEFAULT_DB_FILE,
    };

    use crate::support::{test_config, wait_for_block};

    /// A source whose `open` never completes.
    struct StalledSource;

    #[async_trait]
    impl BlockEventSource for StalledSource {
        async fn open(&self, _start_block: u64) -> Result<BlockEventStream, StreamError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_operations_before_init() {
        let listener: BlockListener = BlockListener::new(test_config());

        assert_eq!(listener.get("org1", 0), Err(ListenerError::NotInitialized));
        assert_eq!(
            listener.list_page("org1", 10, 1),
            Err(ListenerError::NotInitialized)
        );
        assert_eq!(
            listener
                .add_source("org1", Arc::new(InMemoryLedger::new())),
            Err(ListenerError::NotInitialized)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_init_runs_once() {
        let dirs: Vec<_> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
        let listener: Arc<BlockListener> = Arc::new(BlockListener::new(test_config()));

        let handles: Vec<_> = dirs
            .iter()
            .map(|dir| {
                let listener = Arc::clone(&listener);
                let path = dir.path().to_path_buf();
                tokio::spawn(async move { listener.init_once(path).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(()));
        }

        let opened: Vec<_> = dirs
            .iter()
            .filter(|dir| dir.path().join(DEFAULT_DB_FILE).exists())
            .collect();
        assert_eq!(opened.len(), 1);
        assert_eq!(listener.data_dir(), Some(opened[0].path()));

        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_owner_is_refused() {
        let dir = tempfile::tempdir().unwrap();

        let first: BlockListener<FileBackedKVStore> = BlockListener::new(test_config());
        first.init_once(dir.path()).await.unwrap();

        let second: BlockListener<FileBackedKVStore> = BlockListener::new(test_config());
        let err = second.init_once(dir.path()).await.unwrap_err();
        assert!(matches!(err, ListenerError::StorageUnavailable { .. }));
        // The first result sticks.
        assert_eq!(second.init_once(dir.path()).await, Err(err.clone()));
        assert_eq!(second.get_latest("org1"), Err(err));

        first.close().await.unwrap();

        let third: BlockListener<FileBackedKVStore> = BlockListener::new(test_config());
        third.init_once(dir.path()).await.unwrap();
        third.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_during_init_releases_store() {
        let dir = tempfile::tempdir().unwrap();

        for spins in 0..20 {
            let listener: Arc<BlockListener<FileBackedKVStore>> =
                Arc::new(BlockListener::new(test_config()));
            let init = {
                let listener = Arc::clone(&listener);
                let path = dir.path().to_path_buf();
                tokio::spawn(async move { listener.init_once(path).await })
            };
            for _ in 0..spins {
                tokio::task::yield_now().await;
            }
            listener.close().await.unwrap();

            let result = init.await.unwrap();
            assert!(
                matches!(result, Ok(()) | Err(ListenerError::Closed)),
                "spins={spins}: {result:?}"
            );
            assert_eq!(listener.init_once(dir.path()).await, Err(ListenerError::Closed));

            let next: BlockListener<FileBackedKVStore> = BlockListener::new(test_config());
            assert_eq!(next.init_once(dir.path()).await, Ok(()), "spins={spins}");
            next.close().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unusable_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("occupied");
        std::fs::write(&not_a_dir, b"file").unwrap();

        let listener: BlockListener = BlockListener::new(test_config());
        assert!(matches!(
            listener.init_once(&not_a_dir).await,
            Err(ListenerError::StorageUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let listener: BlockListener = BlockListener::new(test_config());
        listener.init_once(dir.path()).await.unwrap();

        let ledger = Arc::new(InMemoryLedger::with_chain(2));
        listener.add_source("org1", ledger.clone()).unwrap();
        wait_for_block(&listener, "org1", 1).await;

        listener.close().await.unwrap();
        listener.close().await.unwrap();
        assert!(listener.is_closed());

        assert_eq!(listener.get("org1", 0), Err(ListenerError::Closed));
        assert_eq!(listener.get_latest("org1"), Err(ListenerError::Closed));
        assert_eq!(listener.sources(), Err(ListenerError::Closed));
        assert_eq!(
            listener.add_source("org2", ledger),
            Err(ListenerError::Closed)
        );
        assert_eq!(
            listener.init_once(dir.path()).await,
            Err(ListenerError::Closed)
        );
    }

    #[tokio::test]
    async fn test_close_does_not_wait_on_stalled_source() {
        let dir = tempfile::tempdir().unwrap();
        let listener: BlockListener =
            BlockListener::new(test_config().with_shutdown_timeout(Duration::from_secs(2)));
        listener.init_once(dir.path()).await.unwrap();
        listener
            .add_source("stalled", Arc::new(StalledSource))
            .unwrap();

        let started = Instant::now();
        listener.close().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_close_before_init() {
        let listener: BlockListener = BlockListener::new(test_config());
        listener.close().await.unwrap();
        listener.close().await.unwrap();
    }
}
