//! Storage interface consumed by the counting engine.
//!
//! The engine keeps no state of its own. Every record lives behind a
//! [`CounterBackend`], which models a key → hash store with per-key expiry:
//! - **Key**: `namespace:identifier` (see [`KeyBuilder`](crate::KeyBuilder)).
//! - **Fields**: bucket slots, stored as decimal integers.
//! - **Expiry**: applied to the whole record, refreshed on every increment.
//!
//! [`InMemoryBackend`] (in the `memory` module) is the in-process implementation;
//! the `rollcount-redis` companion crate maps the same interface onto Redis.

use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub use memory::{InMemoryBackend, MemoryBackendError};

/// One step of an atomic write against a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOp {
    /// Add `by` to the count stored in `slot`, creating it at 0 if missing.
    IncrementField { slot: usize, by: i64 },
    /// Remove `slot` from the record. Missing fields are ignored.
    DeleteField { slot: usize },
    /// Expire the whole record `ttl` from now.
    Expire { ttl: Duration },
}

/// Abstract storage for per-identifier bucket records.
///
/// Implementations must acquire whatever connection or session they need inside each
/// call and release it before returning, on success and on error.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply `ops` to the record at `key` as one unit.
    ///
    /// Either every op is applied or none is; no reader may observe a partial
    /// application. Creates the record if it does not exist.
    async fn atomic(&self, key: &str, ops: &[BucketOp]) -> Result<(), Self::Error>;

    /// Read the raw values of `slots` in one request.
    ///
    /// The result is positionally aligned with `slots`; absent fields (and absent or
    /// expired records) yield `None`.
    async fn read_fields(
        &self,
        key: &str,
        slots: &[usize],
    ) -> Result<Vec<Option<String>>, Self::Error>;

    /// Remove the record at `key`. Removing a missing record succeeds.
    async fn delete(&self, key: &str) -> Result<(), Self::Error>;
}
