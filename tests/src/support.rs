//! Shared fixtures for the integration scenarios.

use std::time::Duration;

use block_listener::{BlockListener, ListenerConfig, OpenableStore};

pub fn test_config() -> ListenerConfig {
    ListenerConfig::for_testing()
}

/// Poll until `source_id` has persisted `sequence`, panicking after 5s.
pub async fn wait_for_block<KV: OpenableStore>(
    listener: &BlockListener<KV>,
    source_id: &str,
    sequence: u64,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while listener.get(source_id, sequence).is_err() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {source_id} block {sequence}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
