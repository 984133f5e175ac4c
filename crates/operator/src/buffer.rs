//! Sink buffer
//!
//! Sinks accept entries synchronously and flush them in batches from a
//! background task. The buffer fills until a chunk-size or chunk-delay
//! threshold, drains through the sink's [`BufferHandler`], retries
//! failures with capped exponential backoff, and applies backpressure
//! (or drops the oldest entry) when full.
//!
//! # Shutdown
//!
//! `stop` cancels intake and gives the flush task a deadline to drain.
//! Entries still unflushed at the deadline are persisted under the
//! sink's scoped persister for a `disk` buffer and reloaded on the next
//! `start`; a `memory` buffer drops them and logs the count.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stave_entry::Entry;
use stave_persist::ScopedPersister;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::duration::Duration;
use crate::error::{BoundaryError, OperatorError, Result};

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;

/// Persister key holding entries that missed the shutdown deadline
const PENDING_KEY: &[u8] = b"pending";

/// Initial retry backoff
const INITIAL_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

/// Retry backoff cap
const MAX_BACKOFF: std::time::Duration = std::time::Duration::from_secs(30);

/// Where unflushed entries go when the process stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferType {
    /// Unflushed entries are dropped at the shutdown deadline
    #[default]
    Memory,
    /// Unflushed entries are persisted and reloaded on restart
    Disk,
}

/// What happens to new entries when the buffer is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFull {
    /// Block the producer until the flush task makes room
    #[default]
    Block,
    /// Drop the oldest buffered entry and count it
    DropOldest,
}

/// Buffer configuration, nested under `buffer:` in sink configs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Shutdown durability policy
    #[serde(rename = "type")]
    pub buffer_type: BufferType,

    /// Entries per flushed chunk
    pub max_chunk_size: usize,

    /// How long a partial chunk waits before flushing anyway
    pub max_chunk_delay: Duration,

    /// Total buffered entries before `on_full` applies
    pub max_size: usize,

    /// Full-buffer policy
    pub on_full: OnFull,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_type: BufferType::Memory,
            max_chunk_size: 1000,
            max_chunk_delay: Duration::from_secs(1),
            max_size: 10_000,
            on_full: OnFull::Block,
        }
    }
}

impl BufferConfig {
    /// Validate thresholds
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(OperatorError::config("'max_chunk_size' must be greater than 0"));
        }
        if self.max_size == 0 {
            return Err(OperatorError::config("'max_size' must be greater than 0"));
        }
        if self.max_size < self.max_chunk_size {
            return Err(OperatorError::config(
                "'max_size' must be at least 'max_chunk_size'",
            ));
        }
        Ok(())
    }
}

/// Receives drained chunks; registered by the owning sink at build time
#[async_trait]
pub trait BufferHandler: Send + Sync {
    /// Deliver a chunk of entries to the sink's destination
    async fn process_multi(&self, entries: Vec<Entry>) -> std::result::Result<(), BoundaryError>;
}

struct Inner {
    config: BufferConfig,
    queue: Mutex<VecDeque<Entry>>,
    not_empty: tokio::sync::Notify,
    not_full: tokio::sync::Notify,
    dropped: AtomicU64,
    cancel: CancellationToken,
    persister: Option<ScopedPersister>,
}

/// Entry buffer owned by a sink
pub struct Buffer {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Buffer {
    /// Create a buffer
    ///
    /// A `disk` buffer requires a scoped persister for its shutdown
    /// spill; a `memory` buffer ignores it.
    pub fn new(config: BufferConfig, persister: Option<ScopedPersister>) -> Result<Self> {
        config.validate()?;
        if config.buffer_type == BufferType::Disk && persister.is_none() {
            return Err(OperatorError::config(
                "a disk buffer requires a configured database",
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                queue: Mutex::new(VecDeque::new()),
                not_empty: tokio::sync::Notify::new(),
                not_full: tokio::sync::Notify::new(),
                dropped: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                persister,
            }),
            task: Mutex::new(None),
        })
    }

    /// Reload any persisted spill and launch the flush task
    ///
    /// Must be called from within a tokio runtime (the owning sink's
    /// `start`).
    pub fn start(&self, handler: Arc<dyn BufferHandler>) -> Result<()> {
        if let Some(persister) = &self.inner.persister {
            persister.load()?;
            if let Some(bytes) = persister.get(PENDING_KEY) {
                match serde_json::from_slice::<Vec<Entry>>(&bytes) {
                    Ok(entries) if !entries.is_empty() => {
                        tracing::info!(
                            entries = entries.len(),
                            "reloaded entries persisted at last shutdown"
                        );
                        self.inner.queue.lock().extend(entries);
                        persister.set(PENDING_KEY, b"[]".to_vec());
                        persister.sync()?;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding unreadable persisted buffer");
                    }
                }
            }
        }

        let inner = Arc::clone(&self.inner);
        *self.task.lock() = Some(tokio::spawn(run_flush(inner, handler)));
        Ok(())
    }

    /// Enqueue an entry, applying the full-buffer policy
    pub async fn push(&self, entry: Entry) -> Result<()> {
        let mut entry = entry;
        loop {
            let notified = self.inner.not_full.notified();
            entry = match self.try_push(entry) {
                Ok(()) => return Ok(()),
                Err(back) => back,
            };
            // The sleep bounds the wait: a drain notification that
            // fires between the capacity check and the select cannot
            // strand the producer.
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
                _ = self.inner.cancel.cancelled() => {
                    return Err(OperatorError::lifecycle("buffer is stopped"));
                }
            }
        }
    }

    /// Entries dropped by the `drop_oldest` policy since creation
    pub fn dropped_entries(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Entries currently buffered
    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    /// Cancel intake, drain within `timeout`, spill or drop the rest
    pub async fn stop(&self, timeout: std::time::Duration) -> Result<()> {
        self.inner.cancel.cancel();
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(timeout, handle).await.is_err() {
                tracing::warn!("flush task missed the shutdown deadline");
                abort.abort();
            }
        }

        let leftovers: Vec<Entry> = self.inner.queue.lock().drain(..).collect();
        if leftovers.is_empty() {
            return Ok(());
        }

        match &self.inner.persister {
            Some(persister) => {
                let encoded = serde_json::to_vec(&leftovers)
                    .map_err(|e| OperatorError::lifecycle(e.to_string()))?;
                persister.set(PENDING_KEY, encoded);
                persister.sync()?;
                tracing::info!(entries = leftovers.len(), "persisted unflushed entries");
            }
            None => {
                tracing::warn!(
                    entries = leftovers.len(),
                    "dropping unflushed entries at shutdown"
                );
            }
        }
        Ok(())
    }

    /// Push without waiting; hands the entry back when full under
    /// `block`
    fn try_push(&self, entry: Entry) -> std::result::Result<(), Entry> {
        let mut queue = self.inner.queue.lock();
        if queue.len() < self.inner.config.max_size {
            queue.push_back(entry);
            drop(queue);
            self.inner.not_empty.notify_one();
            return Ok(());
        }
        if self.inner.config.on_full == OnFull::DropOldest {
            queue.pop_front();
            queue.push_back(entry);
            drop(queue);
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            self.inner.not_empty.notify_one();
            return Ok(());
        }
        Err(entry)
    }
}

/// Pop up to one chunk off the queue
fn take_chunk(inner: &Inner) -> Vec<Entry> {
    let mut queue = inner.queue.lock();
    let take = queue.len().min(inner.config.max_chunk_size);
    queue.drain(..take).collect()
}

/// Put a failed chunk back at the head of the queue, preserving order
fn requeue_front(inner: &Inner, chunk: Vec<Entry>) {
    let mut queue = inner.queue.lock();
    for entry in chunk.into_iter().rev() {
        queue.push_front(entry);
    }
}

async fn run_flush(inner: Arc<Inner>, handler: Arc<dyn BufferHandler>) {
    loop {
        // Wait for the first entry.
        loop {
            if inner.cancel.is_cancelled() {
                final_drain(&inner, &handler).await;
                return;
            }
            let notified = inner.not_empty.notified();
            if !inner.queue.lock().is_empty() {
                break;
            }
            tokio::select! {
                _ = notified => {}
                _ = inner.cancel.cancelled() => {
                    final_drain(&inner, &handler).await;
                    return;
                }
            }
        }

        // Fill up to a full chunk, bounded by the chunk delay.
        let deadline = tokio::time::Instant::now() + inner.config.max_chunk_delay.raw();
        loop {
            if inner.queue.lock().len() >= inner.config.max_chunk_size
                || inner.cancel.is_cancelled()
                || tokio::time::Instant::now() >= deadline
            {
                break;
            }
            let notified = inner.not_empty.notified();
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => break,
                _ = inner.cancel.cancelled() => break,
            }
        }

        let chunk = take_chunk(&inner);
        if chunk.is_empty() {
            continue;
        }
        inner.not_full.notify_waiters();
        deliver(&inner, &handler, chunk).await;
    }
}

/// Deliver one chunk, retrying with capped exponential backoff
async fn deliver(inner: &Inner, handler: &Arc<dyn BufferHandler>, chunk: Vec<Entry>) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match handler.process_multi(chunk.clone()).await {
            Ok(()) => return,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    entries = chunk.len(),
                    backoff_ms = backoff.as_millis() as u64,
                    "flush failed, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = inner.cancel.cancelled() => {
                        requeue_front(inner, chunk);
                        return;
                    }
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Flush everything left after cancellation, without retries
async fn final_drain(inner: &Inner, handler: &Arc<dyn BufferHandler>) {
    loop {
        let chunk = take_chunk(inner);
        if chunk.is_empty() {
            return;
        }
        if let Err(e) = handler.process_multi(chunk.clone()).await {
            tracing::warn!(error = %e, entries = chunk.len(), "final flush failed");
            requeue_front(inner, chunk);
            return;
        }
        inner.not_full.notify_waiters();
    }
}
