//! Sliding-window counter.
//!
//! Semantics:
//! - `increment` adds one occurrence to the slot for "now", purges the slot after it,
//!   and refreshes the record TTL to `period`, all in one atomic backend call.
//! - `histogram` reads the `bucket_count - 1` live slots, most recent first, in one
//!   batched backend call. Missing slots read as 0.
//! - `count` is the sum of `histogram`; it makes no backend call of its own.
//! - `reset` deletes the whole record. Resetting an unknown identifier succeeds.
//!
//! Invariants:
//! - Each operation issues exactly one backend request.
//! - The counter holds no per-identifier state; clones share the backend and may be
//!   used from any number of tasks.
//! - Backend errors are returned as [`CounterError::Backend`], never retried and never
//!   turned into a zero result.
//! - A stored count that is not a non-negative integer reads as 0 and is reported via
//!   a `tracing` warning and a [`CounterEvent::CorruptBucket`] event.
//!
//! Example
//! ```rust
//! use rollcount::{CounterConfig, InMemoryBackend, SlidingWindowCounter};
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = CounterConfig::new("login", Duration::from_secs(60), Duration::from_secs(1)).unwrap();
//! let counter = SlidingWindowCounter::new(InMemoryBackend::new(), config);
//!
//! counter.increment("10.0.0.1").await.unwrap();
//! assert_eq!(counter.histogram("10.0.0.1").await.unwrap().len(), 60);
//! counter.reset("10.0.0.1").await.unwrap();
//! assert_eq!(counter.count("10.0.0.1").await.unwrap(), 0);
//! # });
//! ```

use crate::backend::{BucketOp, CounterBackend};
use crate::bucket::BucketIndexer;
use crate::clock::{Clock, SystemClock};
use crate::config::CounterConfig;
use crate::error::CounterError;
use crate::key::KeyBuilder;
use crate::telemetry::{emit_best_effort, CounterEvent, NullSink, Operation, TelemetrySink};
use std::sync::Arc;

/// Counts occurrences per identifier over a sliding window of fixed-width buckets.
pub struct SlidingWindowCounter<B, S = NullSink> {
    backend: Arc<B>,
    config: CounterConfig,
    indexer: BucketIndexer,
    keys: KeyBuilder,
    clock: Arc<dyn Clock>,
    sink: S,
}

impl<B, S: Clone> Clone for SlidingWindowCounter<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
            indexer: self.indexer,
            keys: self.keys.clone(),
            clock: self.clock.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<B, S> std::fmt::Debug for SlidingWindowCounter<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowCounter")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("backend", &"<backend>")
            .field("sink", &"<sink>")
            .finish()
    }
}

impl<B> SlidingWindowCounter<B, NullSink>
where
    B: CounterBackend,
{
    /// Create a counter that owns `backend`.
    pub fn new(backend: B, config: CounterConfig) -> Self {
        Self::from_shared(Arc::new(backend), config)
    }

    /// Create a counter over a backend handle shared with other counters.
    pub fn from_shared(backend: Arc<B>, config: CounterConfig) -> Self {
        Self {
            backend,
            indexer: BucketIndexer::new(&config),
            keys: KeyBuilder::new(config.namespace()),
            config,
            clock: Arc::new(SystemClock),
            sink: NullSink,
        }
    }
}

impl<B, S> SlidingWindowCounter<B, S>
where
    B: CounterBackend,
    S: TelemetrySink + Sync,
    S::Future: Send + 'static,
{
    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Send events to `sink` instead of the current one.
    pub fn with_sink<S2>(self, sink: S2) -> SlidingWindowCounter<B, S2>
    where
        S2: TelemetrySink,
    {
        SlidingWindowCounter {
            backend: self.backend,
            config: self.config,
            indexer: self.indexer,
            keys: self.keys,
            clock: self.clock,
            sink,
        }
    }

    /// Configuration this counter was built with.
    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Slot arithmetic for this counter.
    pub fn indexer(&self) -> &BucketIndexer {
        &self.indexer
    }

    /// Key derivation for this counter.
    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Backend key holding `id`'s buckets.
    pub fn key_for(&self, id: &str) -> String {
        self.keys.key(id)
    }

    /// Underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Record one occurrence for `id` at the current time.
    pub async fn increment(&self, id: &str) -> Result<(), CounterError<B::Error>> {
        let key = self.keys.key(id);
        let slot = self.indexer.slot_for(self.clock.now_nanos());
        let ops = [
            BucketOp::IncrementField { slot, by: 1 },
            BucketOp::DeleteField { slot: self.indexer.next_slot(slot) },
            BucketOp::Expire { ttl: self.config.period() },
        ];

        if let Err(e) = self.backend.atomic(&key, &ops).await {
            return Err(self.backend_failure(Operation::Increment, key, e).await);
        }
        tracing::debug!(key = %key, slot, "counter increment");
        self.emit(CounterEvent::Incremented { key, slot }).await;
        Ok(())
    }

    /// Per-bucket counts for the live window, most recent tick first.
    ///
    /// Always `bucket_count - 1` entries on success.
    ///
    /// A stored value that is not a non-negative integer reads as 0, negative numbers
    /// included, and is reported as [`CounterEvent::CorruptBucket`].
    pub async fn histogram(&self, id: &str) -> Result<Vec<u64>, CounterError<B::Error>> {
        let key = self.keys.key(id);
        let current = self.indexer.slot_for(self.clock.now_nanos());
        let slots = self.indexer.live_slots(current);

        let raw = match self.backend.read_fields(&key, &slots).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.backend_failure(Operation::Histogram, key, e).await),
        };

        let mut values = raw.into_iter();
        let mut counts = Vec::with_capacity(slots.len());
        let mut corrupt = Vec::new();
        for &slot in &slots {
            let count = match values.next().flatten() {
                None => 0,
                Some(value) => match value.parse::<u64>() {
                    Ok(n) => n,
                    Err(_) => {
                        corrupt.push((slot, value));
                        0
                    }
                },
            };
            counts.push(count);
        }

        for (slot, raw) in corrupt {
            tracing::warn!(key = %key, slot, raw = %raw, "unparseable bucket count read as 0");
            self.emit(CounterEvent::CorruptBucket { key: key.clone(), slot, raw }).await;
        }
        let total = saturating_sum(&counts);
        self.emit(CounterEvent::Read { key, total }).await;
        Ok(counts)
    }

    /// Total occurrences for `id` over the live window.
    pub async fn count(&self, id: &str) -> Result<u64, CounterError<B::Error>> {
        Ok(saturating_sum(&self.histogram(id).await?))
    }

    /// Drop every bucket for `id`.
    pub async fn reset(&self, id: &str) -> Result<(), CounterError<B::Error>> {
        let key = self.keys.key(id);
        if let Err(e) = self.backend.delete(&key).await {
            return Err(self.backend_failure(Operation::Reset, key, e).await);
        }
        tracing::debug!(key = %key, "counter reset");
        self.emit(CounterEvent::Reset { key }).await;
        Ok(())
    }

    async fn emit(&self, event: CounterEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }

    async fn backend_failure(
        &self,
        op: Operation,
        key: String,
        error: B::Error,
    ) -> CounterError<B::Error> {
        tracing::warn!(op = %op, key = %key, error = %error, "counter backend failure");
        let message = error.to_string();
        self.emit(CounterEvent::BackendFailure { op, key, message }).await;
        CounterError::Backend(error)
    }
}

fn saturating_sum(counts: &[u64]) -> u64 {
    counts.iter().fold(0u64, |acc, n| acc.saturating_add(*n))
}
