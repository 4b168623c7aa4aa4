//! Telemetry for counters.
//!
//! Counters emit a [`CounterEvent`] for every operation outcome. Events flow
//! through `TelemetrySink` implementations which can log, collect, or forward them.
//! The default sink is [`NullSink`].
//!
//! # Event Types
//!
//! - **Writes**: `Incremented`, `Reset`
//! - **Reads**: `Read`
//! - **Diagnostics**: `CorruptBucket` (a stored count that is not an integer and was
//!   read as 0), `BackendFailure`
//!
//! ```rust
//! use rollcount::telemetry::CounterEvent;
//!
//! let event = CounterEvent::Incremented { key: "login:10.0.0.1".into(), slot: 7 };
//! assert_eq!(event.to_string(), "Incremented(key=login:10.0.0.1, slot=7)");
//! ```

use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// A telemetry sink that consumes counter events.
///
/// Any `tower::Service<CounterEvent>` that is `Clone + Send` can act as a sink, so
/// standard tower combinators apply.
pub trait TelemetrySink:
    tower::Service<CounterEvent, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
///
/// Counter operations must never fail because telemetry did.
pub async fn emit_best_effort<S>(sink: S, event: CounterEvent)
where
    S: tower::Service<CounterEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// Which counter operation an event or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Increment,
    Histogram,
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Increment => "increment",
            Operation::Histogram => "histogram",
            Operation::Reset => "reset",
        })
    }
}

/// Events emitted by counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterEvent {
    /// One occurrence was recorded in `slot`, and the following slot purged.
    Incremented {
        /// Record key
        key: String,
        /// Slot the occurrence landed in
        slot: usize,
    },
    /// The live window was read.
    Read {
        /// Record key
        key: String,
        /// Sum of the live buckets
        total: u64,
    },
    /// The record was deleted.
    Reset {
        /// Record key
        key: String,
    },
    /// A stored count could not be parsed and was read as 0.
    CorruptBucket {
        /// Record key
        key: String,
        /// Slot holding the bad value
        slot: usize,
        /// The value as stored
        raw: String,
    },
    /// The backend failed; the error was returned to the caller.
    BackendFailure {
        /// Operation that failed
        op: Operation,
        /// Record key
        key: String,
        /// Rendered backend error
        message: String,
    },
}

impl fmt::Display for CounterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterEvent::Incremented { key, slot } => {
                write!(f, "Incremented(key={}, slot={})", key, slot)
            }
            CounterEvent::Read { key, total } => write!(f, "Read(key={}, total={})", key, total),
            CounterEvent::Reset { key } => write!(f, "Reset(key={})", key),
            CounterEvent::CorruptBucket { key, slot, raw } => {
                write!(f, "CorruptBucket(key={}, slot={}, raw={:?})", key, slot, raw)
            }
            CounterEvent::BackendFailure { op, key, message } => {
                write!(f, "BackendFailure(op={}, key={}, error={})", op, key, message)
            }
        }
    }
}

/// Convert a CounterEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &CounterEvent) -> serde_json::Value {
    match event {
        CounterEvent::Incremented { key, slot } => {
            json!({ "kind": "incremented", "key": key, "slot": *slot })
        }
        CounterEvent::Read { key, total } => json!({ "kind": "read", "key": key, "total": *total }),
        CounterEvent::Reset { key } => json!({ "kind": "reset", "key": key }),
        CounterEvent::CorruptBucket { key, slot, raw } => json!({
            "kind": "corrupt_bucket",
            "key": key,
            "slot": *slot,
            "raw": raw,
        }),
        CounterEvent::BackendFailure { op, key, message } => json!({
            "kind": "backend_failure",
            "op": op.to_string(),
            "key": key,
            "error": message,
        }),
    }
}

// ============================================================================
// Built-in Telemetry Sinks
// ============================================================================

/// A no-op telemetry sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<CounterEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: CounterEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for NullSink {
    type SinkError = Infallible;
}

/// A telemetry sink that logs events using the `tracing` crate.
///
/// Events are logged at INFO level with the rendered event as a field.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<CounterEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: CounterEvent) -> Self::Future {
        tracing::info!(event = %event, "counter_event");
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// A telemetry sink that stores events in memory.
///
/// Useful for testing and debugging.
///
/// # Example
///
/// ```rust
/// use rollcount::telemetry::{CounterEvent, MemorySink};
/// use tower::Service;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut sink = MemorySink::new();
/// let event = CounterEvent::Reset { key: "ns:id".into() };
///
/// sink.call(event.clone()).await.unwrap();
///
/// assert_eq!(sink.events(), vec![event]);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<VecDeque<CounterEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    /// Creates a bounded memory sink (default cap: 10,000).
    /// Oldest events are evicted when capacity is exceeded.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Creates a bounded memory sink with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a snapshot of all events received so far.
    pub fn events(&self) -> Vec<CounterEvent> {
        self.events.lock().map(|g| g.iter().cloned().collect()).unwrap_or_default()
    }

    /// Clears all stored events.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }

    /// Returns the number of events stored.
    pub fn len(&self) -> usize {
        self.events.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Returns true if no events are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of evicted events.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<CounterEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: CounterEvent) -> Self::Future {
        // A poisoned sink drops the event rather than failing the counter.
        if let Ok(mut guard) = self.events.lock() {
            if guard.len() >= self.capacity {
                guard.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
            guard.push_back(event);
        }
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}
