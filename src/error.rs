//! Error types for counters and their configuration
use std::fmt;
use std::time::Duration;

/// Error returned by counter operations.
///
/// Backend failures are surfaced unchanged inside [`CounterError::Backend`]; the
/// counter never retries them and never hides them behind a zero result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterError<E> {
    /// The storage backend rejected or failed the request
    Backend(E),
}

impl<E: fmt::Display> fmt::Display for CounterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "counter backend error: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CounterError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(e) => Some(e),
        }
    }
}

impl<E> CounterError<E> {
    /// Check if this error came from the backend
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
    /// Borrow the backend error if present.
    pub fn as_backend(&self) -> Option<&E> {
        match self {
            Self::Backend(e) => Some(e),
        }
    }
    /// Get the backend error if this is a Backend variant
    pub fn into_backend(self) -> Option<E> {
        match self {
            Self::Backend(e) => Some(e),
        }
    }
}

/// Errors produced when validating a [`CounterConfig`](crate::CounterConfig).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Namespace prefix must contain at least one character.
    #[error("namespace must not be empty")]
    EmptyNamespace,
    /// Bucket interval must be > 0.
    #[error("interval must be > 0")]
    ZeroInterval,
    /// The window must hold at least one whole interval.
    #[error("period ({period:?}) must be >= interval ({interval:?})")]
    PeriodShorterThanInterval {
        /// Window length provided by caller.
        period: Duration,
        /// Bucket width provided by caller.
        interval: Duration,
    },
    /// Slot hashing works on `u64` nanoseconds.
    #[error("interval {0:?} does not fit in u64 nanoseconds")]
    IntervalTooLarge(Duration),
    /// `period / interval` is too large to index slots with `usize`.
    #[error("period/interval yields {0} buckets, which does not fit in usize")]
    TooManyBuckets(u128),
}
