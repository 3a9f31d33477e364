//! Expiry Index and Background Sweeper
//!
//! Keys with a TTL are expired in two ways:
//!
//! 1. **Lazy**: every read checks the key's deadline first, so a key is gone
//!    the moment its deadline passes whether or not a sweep has run.
//! 2. **Active**: a background task periodically pops due entries off a
//!    min-heap and deletes them, so keys that are never read again still
//!    free their memory.
//!
//! ## Generations
//!
//! Re-setting a key with a new TTL pushes a new heap entry and leaves the old
//! one in place. Each scheduled deadline gets a fresh generation number and
//! the key's record remembers the latest one. A popped entry only deletes the
//! key when its generation still matches the record; anything else is stale
//! and dropped.
//!
//! ```text
//!   SET k v 10   -> heap: (t+10, gen 1, k)          record k: gen 1
//!   SET k v 100  -> heap: (t+10, gen 1, k),
//!                         (t+100, gen 2, k)          record k: gen 2
//!   t+11 sweep   -> pops gen 1, record says gen 2 -> stale, k survives
//! ```

use crate::storage::StorageEngine;
use bytes::Bytes;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Heap size below which stale entries are never compacted away.
const COMPACT_MIN_HEAP: usize = 64;

/// One scheduled deadline. Ordered by `expire_at`, then `generation`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ExpiryEntry {
    expire_at: Instant,
    generation: u64,
    key: Bytes,
}

/// The deadline currently in force for a key.
#[derive(Debug, Clone, Copy)]
struct ExpiryRecord {
    expire_at: Instant,
    generation: u64,
}

/// Min-heap of deadlines plus the authoritative per-key record.
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    heap: BinaryHeap<Reverse<ExpiryEntry>>,
    records: HashMap<Bytes, ExpiryRecord>,
    next_generation: u64,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `expire_at` as the key's deadline, replacing any previous one.
    ///
    /// Returns the generation assigned to this deadline.
    pub fn schedule(&mut self, key: Bytes, expire_at: Instant) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;

        self.records.insert(
            key.clone(),
            ExpiryRecord {
                expire_at,
                generation,
            },
        );
        self.heap.push(Reverse(ExpiryEntry {
            expire_at,
            generation,
            key,
        }));

        self.maybe_compact();
        generation
    }

    /// Removes the key's deadline. Its heap entries become stale.
    pub fn clear(&mut self, key: &[u8]) -> bool {
        self.records.remove(key).is_some()
    }

    /// The key's current deadline, if it has one.
    pub fn deadline(&self, key: &[u8]) -> Option<Instant> {
        self.records.get(key).map(|r| r.expire_at)
    }

    /// True once `now` is strictly past the key's deadline.
    #[inline]
    pub fn is_expired(&self, key: &[u8], now: Instant) -> bool {
        self.records
            .get(key)
            .is_some_and(|record| now > record.expire_at)
    }

    /// Pops the next key whose deadline is in the past.
    ///
    /// Stale entries met on the way are discarded. Returns `None` as soon as
    /// the earliest remaining entry is not yet due. The returned key's record
    /// has already been removed.
    pub fn pop_due(&mut self, now: Instant) -> Option<Bytes> {
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.expire_at >= now {
                return None;
            }

            let Reverse(entry) = self.heap.pop()?;
            let current = self
                .records
                .get(&entry.key)
                .is_some_and(|record| record.generation == entry.generation);

            if current {
                self.records.remove(&entry.key);
                return Some(entry.key);
            }
            trace!(generation = entry.generation, "Discarding stale expiry entry");
        }
        None
    }

    /// Number of keys with a deadline.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of heap entries, stale ones included.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Rebuilds the heap from the live records once stale entries dominate.
    fn maybe_compact(&mut self) {
        if self.heap.len() <= COMPACT_MIN_HEAP || self.heap.len() <= self.records.len() * 2 {
            return;
        }

        let before = self.heap.len();
        self.heap = self
            .records
            .iter()
            .map(|(key, record)| {
                Reverse(ExpiryEntry {
                    expire_at: record.expire_at,
                    generation: record.generation,
                    key: key.clone(),
                })
            })
            .collect();
        trace!(before, after = self.heap.len(), "Compacted expiry heap");
    }
}

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 100ms)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config.clone(), shutdown_rx));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background expiry sweeper started"
        );

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        debug!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let expired = engine.cleanup_expired();
        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
