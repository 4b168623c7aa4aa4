use super::{BucketOp, CounterBackend};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Errors from [`InMemoryBackend`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MemoryBackendError {
    /// A previous holder of the store lock panicked.
    #[error("in-memory counter store lock poisoned")]
    Poisoned,
    /// An increment targeted a field whose value is not an integer.
    #[error("value at {key}[{slot}] is not an integer")]
    NotAnInteger { key: String, slot: usize },
    /// An increment would leave the i64 range.
    #[error("increment of {key}[{slot}] overflows")]
    Overflow { key: String, slot: usize },
}

#[derive(Debug, Default, Clone)]
struct Record {
    fields: HashMap<usize, String>,
    // Absolute deadline in clock nanos; `None` means the record never expires.
    expires_at: Option<u64>,
}

impl Record {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory counter store.
///
/// Mirrors a Redis hash per key: string field values, whole-record expiry, and
/// all-or-nothing [`CounterBackend::atomic`]. Expired records are dropped lazily
/// when touched. Clones share the same data.
#[derive(Clone, Debug)]
pub struct InMemoryBackend {
    data: Arc<Mutex<HashMap<String, Record>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self { data: Arc::default(), clock: Arc::new(SystemClock) }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the clock used for expiry (share it with the counter in tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Record>>, MemoryBackendError> {
        self.data.lock().map_err(|_| MemoryBackendError::Poisoned)
    }

    /// Fetch a live record, dropping it first if it has expired.
    fn live<'a>(
        guard: &'a mut HashMap<String, Record>,
        key: &str,
        now: u64,
    ) -> Option<&'a mut Record> {
        if guard.get(key).is_some_and(|r| r.is_expired(now)) {
            guard.remove(key);
        }
        guard.get_mut(key)
    }

    /// Store a raw field value without expiry, bypassing integer checks.
    ///
    /// Useful for seeding records, including values a real store could hold after
    /// an out-of-band write.
    pub fn insert_raw(
        &self,
        key: impl Into<String>,
        slot: usize,
        value: impl Into<String>,
    ) -> Result<(), MemoryBackendError> {
        let now = self.clock.now_nanos();
        let key = key.into();
        let mut guard = self.lock()?;
        Self::live(&mut guard, &key, now);
        guard.entry(key).or_default().fields.insert(slot, value.into());
        Ok(())
    }

    /// True if a live record exists for `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool, MemoryBackendError> {
        let now = self.clock.now_nanos();
        let mut guard = self.lock()?;
        Ok(Self::live(&mut guard, key, now).is_some())
    }

    /// Slots currently stored for `key`, sorted.
    pub fn slots(&self, key: &str) -> Result<Vec<usize>, MemoryBackendError> {
        let now = self.clock.now_nanos();
        let mut guard = self.lock()?;
        let mut slots: Vec<usize> = Self::live(&mut guard, key, now)
            .map(|r| r.fields.keys().copied().collect())
            .unwrap_or_default();
        slots.sort_unstable();
        Ok(slots)
    }

    /// Time left before `key` expires; `None` if absent or without expiry.
    pub fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, MemoryBackendError> {
        let now = self.clock.now_nanos();
        let mut guard = self.lock()?;
        Ok(Self::live(&mut guard, key, now)
            .and_then(|r| r.expires_at)
            .map(|deadline| Duration::from_nanos(deadline.saturating_sub(now))))
    }

    /// Number of live records.
    pub fn len(&self) -> Result<usize, MemoryBackendError> {
        let now = self.clock.now_nanos();
        let mut guard = self.lock()?;
        guard.retain(|_, r| !r.is_expired(now));
        Ok(guard.len())
    }

    /// True if no live records remain.
    pub fn is_empty(&self) -> Result<bool, MemoryBackendError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl CounterBackend for InMemoryBackend {
    type Error = MemoryBackendError;

    async fn atomic(&self, key: &str, ops: &[BucketOp]) -> Result<(), Self::Error> {
        let now = self.clock.now_nanos();
        let mut guard = self.lock()?;
        let mut record = Self::live(&mut guard, key, now).cloned().unwrap_or_default();

        // Apply to a copy so a failing op leaves the stored record untouched.
        for op in ops {
            match *op {
                BucketOp::IncrementField { slot, by } => {
                    let current = match record.fields.get(&slot) {
                        Some(raw) => raw.parse::<i64>().map_err(|_| {
                            MemoryBackendError::NotAnInteger { key: key.to_string(), slot }
                        })?,
                        None => 0,
                    };
                    let next = current.checked_add(by).ok_or_else(|| {
                        MemoryBackendError::Overflow { key: key.to_string(), slot }
                    })?;
                    record.fields.insert(slot, next.to_string());
                }
                BucketOp::DeleteField { slot } => {
                    record.fields.remove(&slot);
                }
                BucketOp::Expire { ttl } => {
                    let ttl = u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX);
                    record.expires_at = Some(now.saturating_add(ttl));
                }
            }
        }

        // Like a Redis hash, a record with no fields does not exist.
        if record.fields.is_empty() || record.is_expired(now) {
            guard.remove(key);
        } else {
            guard.insert(key.to_string(), record);
        }
        Ok(())
    }

    async fn read_fields(
        &self,
        key: &str,
        slots: &[usize],
    ) -> Result<Vec<Option<String>>, Self::Error> {
        let now = self.clock.now_nanos();
        let mut guard = self.lock()?;
        Ok(match Self::live(&mut guard, key, now) {
            Some(record) => slots.iter().map(|slot| record.fields.get(slot).cloned()).collect(),
            None => vec![None; slots.len()],
        })
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.lock()?.remove(key);
        Ok(())
    }
}
