//! Counter configuration.
//!
//! A [`CounterConfig`] is validated once at construction and never changes for the
//! lifetime of the counter built from it. The derived `bucket_count` is
//! `floor(period / interval) + 1`; the extra slot is the one rotated out on the next
//! tick and is never part of a read.

use crate::error::ConfigError;
use std::time::Duration;

/// Validated configuration for a sliding-window counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    namespace: String,
    period: Duration,
    interval: Duration,
    interval_nanos: u64,
    bucket_count: usize,
}

impl CounterConfig {
    /// Create a config with validation.
    ///
    /// Errors if `namespace` is empty, `interval` is zero, `period < interval`, or the
    /// derived slot arithmetic does not fit in `u64`/`usize`.
    ///
    /// # Examples
    /// ```
    /// use rollcount::CounterConfig;
    /// use std::time::Duration;
    /// let cfg = CounterConfig::new("login", Duration::from_secs(60), Duration::from_secs(1)).unwrap();
    /// assert_eq!(cfg.bucket_count(), 61);
    /// ```
    pub fn new(
        namespace: impl Into<String>,
        period: Duration,
        interval: Duration,
    ) -> Result<Self, ConfigError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if period < interval {
            return Err(ConfigError::PeriodShorterThanInterval { period, interval });
        }
        let interval_nanos =
            u64::try_from(interval.as_nanos()).map_err(|_| ConfigError::IntervalTooLarge(interval))?;
        let ticks = period.as_nanos() / interval.as_nanos();
        let bucket_count = ticks
            .checked_add(1)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(ConfigError::TooManyBuckets(ticks.saturating_add(1)))?;

        Ok(Self { namespace, period, interval, interval_nanos, bucket_count })
    }

    /// Start a builder with defaults (60s window, 1s buckets).
    pub fn builder() -> CounterConfigBuilder {
        CounterConfigBuilder::new()
    }

    /// Prefix every record key is scoped under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Sliding window length; also the TTL applied to each record.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Width of one bucket.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Bucket width in nanoseconds.
    pub fn interval_nanos(&self) -> u64 {
        self.interval_nanos
    }

    /// `floor(period / interval) + 1`.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }
}

/// Builder for [`CounterConfig`].
#[derive(Debug, Clone)]
pub struct CounterConfigBuilder {
    namespace: String,
    period: Duration,
    interval: Duration,
}

impl CounterConfigBuilder {
    /// Create a builder with sane defaults.
    pub fn new() -> Self {
        Self { namespace: String::new(), period: Duration::from_secs(60), interval: Duration::from_secs(1) }
    }

    /// Set the key prefix. Required.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the sliding window length.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Set the bucket width.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<CounterConfig, ConfigError> {
        CounterConfig::new(self.namespace, self.period, self.interval)
    }
}

impl Default for CounterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::CounterConfig;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    /// On-disk form: durations as whole milliseconds.
    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RawCounterConfig {
        namespace: String,
        period_ms: u64,
        interval_ms: u64,
    }

    impl Serialize for CounterConfig {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            RawCounterConfig {
                namespace: self.namespace.clone(),
                period_ms: u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX),
                interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            }
            .serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for CounterConfig {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = RawCounterConfig::deserialize(deserializer)?;
            CounterConfig::new(
                raw.namespace,
                Duration::from_millis(raw.period_ms),
                Duration::from_millis(raw.interval_ms),
            )
            .map_err(serde::de::Error::custom)
        }
    }
}
