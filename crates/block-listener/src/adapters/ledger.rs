//! # In-Memory Ledger
//!
//! A `BlockEventSource` backed by a local chain. Opening replays stored
//! blocks from the requested start, then forwards blocks appended later.
//! Used by tests and by in-process feeders.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::domain::entities::{BlockEvent, BlockHeader};
use crate::domain::errors::StreamError;
use crate::domain::hashing::encode_header;
use crate::ports::outbound::{BlockEventSource, BlockEventStream};

const LIVE_CAPACITY: usize = 1024;
const STREAM_BUFFER: usize = 64;

pub struct InMemoryLedger {
    blocks: RwLock<Vec<BlockEvent>>,
    live: broadcast::Sender<BlockEvent>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    opened_from: Mutex<Vec<u64>>,
    failing_opens: AtomicU32,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            blocks: RwLock::new(Vec::new()),
            live,
            forwarders: Mutex::new(Vec::new()),
            opened_from: Mutex::new(Vec::new()),
            failing_opens: AtomicU32::new(0),
        }
    }

    /// Ledger pre-populated with blocks `0..len`, one transaction each.
    pub fn with_chain(len: u64) -> Self {
        let ledger = Self::new();
        for _ in 0..len {
            ledger.append_block(1);
        }
        ledger
    }

    /// Append the next hash-linked block and deliver it to open streams.
    pub fn append_block(&self, tx_count: usize) -> BlockEvent {
        let mut blocks = self.blocks.write();
        let number = blocks.len() as u64;
        let previous_hash = blocks
            .last()
            .map(|prev| {
                let header = &prev.header;
                Sha256::digest(encode_header(
                    header.number,
                    &header.previous_hash,
                    &header.data_hash,
                ))
                .to_vec()
            })
            .unwrap_or_default();

        let data: Vec<Vec<u8>> = (0..tx_count)
            .map(|i| format!("tx-{number}-{i}").into_bytes())
            .collect();
        let mut hasher = Sha256::new();
        for envelope in &data {
            hasher.update(envelope);
        }

        let event = BlockEvent::new(
            BlockHeader {
                number,
                previous_hash,
                data_hash: hasher.finalize().to_vec(),
            },
            data,
        );
        blocks.push(event.clone());
        let _ = self.live.send(event.clone());
        event
    }

    /// Deliver an arbitrary event (out-of-order or duplicate numbers allowed).
    pub fn publish(&self, event: BlockEvent) {
        let mut blocks = self.blocks.write();
        blocks.push(event.clone());
        let _ = self.live.send(event);
    }

    pub fn height(&self) -> u64 {
        self.blocks
            .read()
            .iter()
            .map(|b| b.number() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Start blocks requested by every `open`, in call order.
    pub fn opened_from(&self) -> Vec<u64> {
        self.opened_from.lock().clone()
    }

    /// End every open stream, as a dropped gateway connection would.
    pub fn drop_connections(&self) {
        for handle in self.forwarders.lock().drain(..) {
            handle.abort();
        }
    }

    /// Make the next `count` calls to `open` fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BlockEventSource for InMemoryLedger {
    async fn open(&self, start_block: u64) -> Result<BlockEventStream, StreamError> {
        self.opened_from.lock().push(start_block);

        if self.take_failure() {
            return Err(StreamError::OpenFailed {
                start: start_block,
                message: "ledger unavailable".to_string(),
            });
        }

        // Subscribe under the read lock so no block falls between the
        // backlog and the live feed.
        let (backlog, mut live) = {
            let blocks = self.blocks.read();
            let backlog: Vec<BlockEvent> = blocks
                .iter()
                .filter(|b| b.number() >= start_block)
                .cloned()
                .collect();
            (backlog, self.live.subscribe())
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let handle = tokio::spawn(async move {
            let mut next = start_block;
            for event in backlog {
                next = next.max(event.number() + 1);
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }

            loop {
                match live.recv().await {
                    Ok(event) => {
                        if event.number() < next {
                            continue;
                        }
                        next = event.number() + 1;
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let _ = tx
                            .send(Err(StreamError::Delivery {
                                message: format!("stream lagged by {skipped} blocks"),
                            }))
                            .await;
                        return;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        let mut forwarders = self.forwarders.lock();
        forwarders.retain(|h| !h.is_finished());
        forwarders.push(handle);

        let stream: BlockEventStream = Box::pin(ReceiverStream::new(rx));
        Ok(stream)
    }
}
