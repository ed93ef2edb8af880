//! # Concurrent Subscriptions
//!
//! Several sources feeding one listener, stream drops, and paginated reads
//! against the default on-disk store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use block_listener::{BlockListener, InMemoryLedger, ListenerError, ReconnectPolicy};

    use crate::support::{test_config, wait_for_block};

    async fn open_listener(dir: &tempfile::TempDir) -> BlockListener {
        let listener: BlockListener = BlockListener::new(test_config());
        listener.init_once(dir.path()).await.unwrap();
        listener
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_sources_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let listener = open_listener(&dir).await;
        let bank = Arc::new(InMemoryLedger::with_chain(20));
        let realty = Arc::new(InMemoryLedger::with_chain(7));

        listener.add_source("org1", bank.clone()).unwrap();
        listener.add_source("org2", realty.clone()).unwrap();

        // Live blocks interleave with the backlog replay.
        for _ in 0..5 {
            bank.append_block(1);
            realty.append_block(2);
        }
        wait_for_block(&listener, "org1", 24).await;
        wait_for_block(&listener, "org2", 11).await;

        assert_eq!(listener.get_latest("org1").unwrap().sequence_number, 24);
        assert_eq!(listener.get_latest("org2").unwrap().sequence_number, 11);
        assert!(listener.get("org2", 12).unwrap_err().is_not_found());

        let page = listener.list_page("org2", 5, 3).unwrap();
        assert_eq!(page.sequence_numbers(), vec![1, 0]);
        assert!(!page.has_more);

        let sources = listener.sources().unwrap();
        let ids: Vec<_> = sources.iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(ids, vec!["org1", "org2"]);
        assert!(sources.iter().all(|s| s.running));

        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_pagination_over_25_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let listener = open_listener(&dir).await;
        listener
            .add_source("org1", Arc::new(InMemoryLedger::with_chain(25)))
            .unwrap();
        wait_for_block(&listener, "org1", 24).await;

        let first = listener.list_page("org1", 10, 1).unwrap();
        assert_eq!(first.sequence_numbers(), (15..25).rev().collect::<Vec<_>>());
        assert!(first.has_more);

        let third = listener.list_page("org1", 10, 3).unwrap();
        assert_eq!(third.sequence_numbers(), vec![4, 3, 2, 1, 0]);
        assert!(!third.has_more);

        let fourth = listener.list_page("org1", 10, 4).unwrap();
        assert!(fourth.blocks.is_empty());
        assert!(!fourth.has_more);

        assert_eq!(
            listener.list_page("orgZ", 10, 1),
            Err(ListenerError::SourceNotFound {
                source_id: "orgZ".into()
            })
        );

        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_after_stream_drop() {
        let dir = tempfile::tempdir().unwrap();
        let listener = open_listener(&dir).await;
        let ledger = Arc::new(InMemoryLedger::with_chain(3));

        listener.add_source("org1", ledger.clone()).unwrap();
        wait_for_block(&listener, "org1", 2).await;

        ledger.drop_connections();
        ledger.fail_next_opens(1);
        ledger.append_block(1);
        ledger.append_block(1);
        wait_for_block(&listener, "org1", 4).await;

        let opened = ledger.opened_from();
        assert_eq!(opened[0], 0);
        assert!(opened.len() >= 2);
        assert!(opened[1..].iter().all(|&start| start == 3));
        assert!(listener.list_page("org1", 10, 1).unwrap().is_complete());

        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_reconnect_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let listener: BlockListener =
            BlockListener::new(test_config().with_reconnect(ReconnectPolicy::disabled()));
        listener.init_once(dir.path()).await.unwrap();
        let ledger = Arc::new(InMemoryLedger::with_chain(2));

        listener.add_source("org1", ledger.clone()).unwrap();
        wait_for_block(&listener, "org1", 1).await;
        ledger.drop_connections();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while listener.sources().unwrap()[0].running {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ledger.opened_from(), vec![0]);

        // Still registered until close.
        assert!(matches!(
            listener.add_source("org1", ledger.clone()),
            Err(ListenerError::AlreadyRegistered { .. })
        ));
        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let dir = tempfile::tempdir().unwrap();
        let listener = open_listener(&dir).await;
        let ledger = Arc::new(InMemoryLedger::new());

        listener.add_source("org1", ledger.clone()).unwrap();
        assert_eq!(
            listener.add_source("org1", ledger.clone()),
            Err(ListenerError::AlreadyRegistered {
                source_id: "org1".into()
            })
        );
        assert_eq!(listener.sources().unwrap().len(), 1);

        listener.close().await.unwrap();
    }
}
