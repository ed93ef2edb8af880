//! # Subscription Manager
//!
//! One supervised tokio task per registered source. Each task resumes from
//! the store, persists every delivered block, and reopens the stream under
//! the configured `ReconnectPolicy` when it ends.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use super::resume::ResumeTracker;
use super::store::BlockStore;
use crate::domain::entities::BlockRecord;
use crate::domain::errors::ListenerError;
use crate::domain::value_objects::{validate_source_id, ReconnectPolicy};
use crate::ports::outbound::{BlockEventSource, KeyValueStore, TimeSource};

/// Why a listening task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    /// Shutdown was requested.
    Cancelled,
    /// The store was closed underneath the task.
    StoreClosed,
    /// The stream ended and reconnecting is disabled.
    StreamEnded,
    /// Reconnect attempts were exhausted.
    GaveUp,
}

/// Snapshot of one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub source_id: String,
    pub registered_at: DateTime<Utc>,
    /// False once the task has exited for any reason.
    pub running: bool,
}

struct Registration {
    handle: JoinHandle<TaskExit>,
    registered_at: DateTime<Utc>,
}

pub struct SubscriptionManager<KV: KeyValueStore> {
    store: Arc<BlockStore<KV>>,
    clock: Arc<dyn TimeSource>,
    policy: ReconnectPolicy,
    registrations: RwLock<HashMap<String, Registration>>,
    shutdown: watch::Sender<bool>,
}

impl<KV: KeyValueStore> SubscriptionManager<KV> {
    pub fn new(
        store: Arc<BlockStore<KV>>,
        clock: Arc<dyn TimeSource>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            clock,
            policy,
            registrations: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    /// Register a source and start listening to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_source(
        &self,
        source_id: &str,
        source: Arc<dyn BlockEventSource>,
    ) -> Result<(), ListenerError> {
        if !validate_source_id(source_id) {
            return Err(ListenerError::InvalidSourceId(source_id.to_string()));
        }
        if *self.shutdown.borrow() {
            return Err(ListenerError::Closed);
        }

        let mut registrations = self.registrations.write();
        if registrations.contains_key(source_id) {
            return Err(ListenerError::AlreadyRegistered {
                source_id: source_id.to_string(),
            });
        }

        let task = SourceTask {
            source_id: source_id.to_string(),
            source,
            store: Arc::clone(&self.store),
            resume: ResumeTracker::new(Arc::clone(&self.store)),
            clock: Arc::clone(&self.clock),
            policy: self.policy.clone(),
            shutdown: self.shutdown.subscribe(),
        };
        let handle = tokio::spawn(task.run());

        registrations.insert(
            source_id.to_string(),
            Registration {
                handle,
                registered_at: self.clock.now(),
            },
        );
        tracing::info!(source = source_id, "Source registered");
        Ok(())
    }

    pub fn is_registered(&self, source_id: &str) -> bool {
        self.registrations.read().contains_key(source_id)
    }

    /// Registered sources, sorted by id.
    pub fn sources(&self) -> Vec<SourceStatus> {
        let mut sources: Vec<SourceStatus> = self
            .registrations
            .read()
            .iter()
            .map(|(source_id, reg)| SourceStatus {
                source_id: source_id.clone(),
                registered_at: reg.registered_at,
                running: !reg.handle.is_finished(),
            })
            .collect();
        sources.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        sources
    }

    /// Signal every task to stop and wait up to `timeout` for them.
    ///
    /// Tasks still running at the deadline are aborted. Returns how many
    /// were aborted.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        self.shutdown.send_replace(true);

        let handles: Vec<(String, JoinHandle<TaskExit>)> = self
            .registrations
            .write()
            .drain()
            .map(|(source_id, reg)| (source_id, reg.handle))
            .collect();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = 0;

        for (source_id, mut handle) in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(exit)) => {
                    tracing::debug!(source = %source_id, ?exit, "Listener task joined");
                }
                Ok(Err(e)) => {
                    tracing::warn!(source = %source_id, error = %e, "Listener task failed");
                }
                Err(_) => {
                    tracing::warn!(
                        source = %source_id,
                        "Listener task did not stop in time; aborting"
                    );
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        aborted
    }
}

enum SessionEnd {
    Cancelled,
    StoreClosed,
    /// The stream failed or ended after persisting `persisted` blocks.
    Interrupted { persisted: u64, reason: String },
}

struct SourceTask<KV: KeyValueStore> {
    source_id: String,
    source: Arc<dyn BlockEventSource>,
    store: Arc<BlockStore<KV>>,
    resume: ResumeTracker<KV>,
    clock: Arc<dyn TimeSource>,
    policy: ReconnectPolicy,
    shutdown: watch::Receiver<bool>,
}

/// Resolves once shutdown is signalled or the manager is dropped.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

impl<KV: KeyValueStore> SourceTask<KV> {
    async fn run(mut self) -> TaskExit {
        let mut attempt = 0u32;

        let exit = loop {
            let (persisted, reason) = match self.run_session().await {
                SessionEnd::Cancelled => break TaskExit::Cancelled,
                SessionEnd::StoreClosed => break TaskExit::StoreClosed,
                SessionEnd::Interrupted { persisted, reason } => (persisted, reason),
            };

            if self.policy.max_attempts == 0 {
                tracing::info!(source = %self.source_id, reason = %reason, "Block stream ended");
                break TaskExit::StreamEnded;
            }
            if persisted > 0 {
                attempt = 0;
            }
            attempt += 1;
            if attempt > self.policy.max_attempts {
                tracing::error!(
                    source = %self.source_id,
                    attempts = self.policy.max_attempts,
                    reason = %reason,
                    "Giving up on block stream"
                );
                break TaskExit::GaveUp;
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(
                source = %self.source_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Block stream interrupted; reconnecting"
            );
            tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => break TaskExit::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        };

        tracing::info!(source = %self.source_id, ?exit, "Listener task exited");
        exit
    }

    async fn run_session(&mut self) -> SessionEnd {
        let start = match self.resume.resume_from(&self.source_id) {
            Ok(start) => start,
            Err(ListenerError::Closed) => return SessionEnd::StoreClosed,
            Err(e) => {
                return SessionEnd::Interrupted {
                    persisted: 0,
                    reason: e.to_string(),
                }
            }
        };

        let opened = tokio::select! {
            biased;
            _ = cancelled(&mut self.shutdown) => return SessionEnd::Cancelled,
            opened = self.source.open(start) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                return SessionEnd::Interrupted {
                    persisted: 0,
                    reason: e.to_string(),
                }
            }
        };
        tracing::info!(source = %self.source_id, start, "Listening for block events");

        let mut expected = start;
        let mut persisted = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => return SessionEnd::Cancelled,
                next = stream.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    return SessionEnd::Interrupted {
                        persisted,
                        reason: e.to_string(),
                    }
                }
                None => {
                    return SessionEnd::Interrupted {
                        persisted,
                        reason: "stream closed by source".to_string(),
                    }
                }
            };

            let number = event.number();
            if number < expected {
                tracing::debug!(
                    source = %self.source_id,
                    block = number,
                    expected,
                    "Skipping already persisted block"
                );
                continue;
            }
            if number > expected {
                tracing::warn!(
                    source = %self.source_id,
                    block = number,
                    expected,
                    "Block sequence gap"
                );
            }

            let record = BlockRecord::from_event(&self.source_id, &event, self.clock.now());
            let store = Arc::clone(&self.store);
            let written = tokio::task::spawn_blocking(move || store.put(&record).map(|()| record))
                .await;

            match written {
                Ok(Ok(record)) => {
                    tracing::info!(
                        source = %self.source_id,
                        block = number,
                        tx_count = record.tx_count,
                        hash = %record.block_hash,
                        "Saved block"
                    );
                    expected = number + 1;
                    persisted += 1;
                }
                Ok(Err(ListenerError::Closed)) => return SessionEnd::StoreClosed,
                Ok(Err(e)) => {
                    tracing::error!(
                        source = %self.source_id,
                        block = number,
                        error = %e,
                        "Failed to persist block"
                    );
                    return SessionEnd::Interrupted {
                        persisted,
                        reason: e.to_string(),
                    };
                }
                Err(e) => {
                    tracing::error!(
                        source = %self.source_id,
                        block = number,
                        error = %e,
                        "Block write task failed"
                    );
                    return SessionEnd::Interrupted {
                        persisted,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }
}
