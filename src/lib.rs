#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # rollcount
//!
//! Approximate sliding-window event counters for Rust: "how many times did this
//! identifier do X in the last N seconds?", answered from a fixed ring of
//! time buckets instead of a log of every event.
//!
//! ## Features
//!
//! - **Bucketed windows**: `floor(period / interval) + 1` slots per identifier
//! - **O(1) rotation**: each increment purges the slot the next tick will reuse, so
//!   no sweeper or scan is ever needed
//! - **Pluggable storage** via [`CounterBackend`] (in-memory here, Redis in
//!   `rollcount-redis`)
//! - **Telemetry** through `tower::Service` sinks and `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use rollcount::{CounterConfig, InMemoryBackend, SlidingWindowCounter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CounterConfig::builder()
//!         .namespace("login-failures")
//!         .period(Duration::from_secs(60))
//!         .interval(Duration::from_secs(1))
//!         .build()
//!         .unwrap();
//!     let counter = SlidingWindowCounter::new(InMemoryBackend::new(), config);
//!
//!     counter.increment("user1").await.unwrap();
//!     counter.increment("user1").await.unwrap();
//!     assert_eq!(counter.count("user1").await.unwrap(), 2);
//! }
//! ```

pub mod backend;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod counter;
pub mod error;
pub mod key;
pub mod prelude;
pub mod telemetry;

// Re-exports
pub use backend::{BucketOp, CounterBackend, InMemoryBackend, MemoryBackendError};
pub use bucket::BucketIndexer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CounterConfig, CounterConfigBuilder};
pub use counter::SlidingWindowCounter;
pub use error::{ConfigError, CounterError};
pub use key::KeyBuilder;
