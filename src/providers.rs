//! Shared provider traits for dependency injection.
//!
//! Time and sleeping are abstracted behind traits so the throttle, the cache
//! TTL and the retry delay schedule can be tested without waiting on a real
//! clock.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for providing timestamps.
///
/// # Example
///
/// ```
/// use idea_validator::providers::{TimeProvider, SystemTimeProvider};
///
/// let provider = SystemTimeProvider;
/// let timestamp = provider.now();
/// assert!(timestamp > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> u64;
}

/// Default time provider using system time.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Time provider whose clock only moves when told to.
///
/// ```
/// use idea_validator::providers::{ManualTimeProvider, TimeProvider};
///
/// let clock = ManualTimeProvider::new(1_000);
/// clock.advance(299);
/// assert_eq!(clock.now(), 1_299);
/// ```
pub struct ManualTimeProvider {
    now: AtomicU64,
}

impl ManualTimeProvider {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, timestamp: u64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Trait for suspending the current flow between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_time_provider_set_and_advance() {
        let clock = ManualTimeProvider::new(10);
        assert_eq!(clock.now(), 10);

        clock.advance(5);
        assert_eq!(clock.now(), 15);

        clock.set(100);
        assert_eq!(clock.now(), 100);
    }

    #[tokio::test]
    async fn test_tokio_sleeper_zero_duration_returns() {
        TokioSleeper.sleep(Duration::ZERO).await;
    }
}
