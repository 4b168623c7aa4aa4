//! Convenient re-exports for common rollcount types.
pub use crate::{
    backend::{BucketOp, CounterBackend, InMemoryBackend},
    clock::{Clock, ManualClock, SystemClock},
    config::CounterConfig,
    counter::SlidingWindowCounter,
    error::{ConfigError, CounterError},
    telemetry::{CounterEvent, LogSink, MemorySink, NullSink, TelemetrySink},
};
