#![allow(dead_code)]

use async_trait::async_trait;
use rollcount::{BucketOp, CounterBackend, CounterConfig, InMemoryBackend, ManualClock};
use rollcount::SlidingWindowCounter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const EPOCH_SECS: u64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub String);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestError: {}", self.0)
    }
}

impl std::error::Error for TestError {}

/// Backend whose every call fails.
#[derive(Debug, Default, Clone)]
pub struct FailingBackend;

#[async_trait]
impl CounterBackend for FailingBackend {
    type Error = TestError;

    async fn atomic(&self, _key: &str, _ops: &[BucketOp]) -> Result<(), Self::Error> {
        Err(TestError("connection refused".into()))
    }

    async fn read_fields(
        &self,
        _key: &str,
        _slots: &[usize],
    ) -> Result<Vec<Option<String>>, Self::Error> {
        Err(TestError("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), Self::Error> {
        Err(TestError("connection refused".into()))
    }
}

/// Wraps the in-memory backend and counts requests per kind.
#[derive(Debug, Clone, Default)]
pub struct CountingBackend {
    pub inner: InMemoryBackend,
    pub atomics: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
    pub deletes: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.atomics.load(Ordering::SeqCst),
            self.reads.load(Ordering::SeqCst),
            self.deletes.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl CounterBackend for CountingBackend {
    type Error = <InMemoryBackend as CounterBackend>::Error;

    async fn atomic(&self, key: &str, ops: &[BucketOp]) -> Result<(), Self::Error> {
        self.atomics.fetch_add(1, Ordering::SeqCst);
        self.inner.atomic(key, ops).await
    }

    async fn read_fields(
        &self,
        key: &str,
        slots: &[usize],
    ) -> Result<Vec<Option<String>>, Self::Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_fields(key, slots).await
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
}

/// In-memory counter on a manual clock shared with its backend.
pub fn memory_counter(
    namespace: &str,
    period: Duration,
    interval: Duration,
    start: Duration,
) -> (SlidingWindowCounter<InMemoryBackend>, InMemoryBackend, ManualClock) {
    let clock = ManualClock::starting_at(start);
    let backend = InMemoryBackend::new().with_clock(clock.clone());
    let config = CounterConfig::new(namespace, period, interval).expect("valid config");
    let counter = SlidingWindowCounter::new(backend.clone(), config).with_clock(clock.clone());
    (counter, backend, clock)
}
