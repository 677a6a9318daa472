//! Minimum-interval pacing for geocoder requests.
//!
//! [`MinIntervalGate::wait`] is awaited before every request and blocks
//! until at least `min_interval` has passed since the previous one. Time
//! comes from a [`Clock`] so tests can use [`ManualClock`] and never sleep.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Source of monotonic time and sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Suspends for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and `tokio::time::sleep`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly and
/// records the requested duration.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }

    /// Every duration passed to [`Clock::sleep`], in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all recorded sleeps.
    #[must_use]
    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
    }
}

/// Enforces a minimum delay between consecutive requests.
pub struct MinIntervalGate {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    last: Option<Duration>,
}

impl MinIntervalGate {
    #[must_use]
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            min_interval,
            last: None,
        }
    }

    /// Gate driven by the wall clock.
    #[must_use]
    pub fn system(min_interval: Duration) -> Self {
        Self::new(min_interval, Arc::new(SystemClock::new()))
    }

    /// The configured minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request may be sent, then marks the current time as
    /// the latest request. The first call never waits.
    ///
    /// Returns how long this call waited.
    pub async fn wait(&mut self) -> Duration {
        let mut waited = Duration::ZERO;

        if let Some(last) = self.last {
            let ready_at = last + self.min_interval;
            let now = self.clock.elapsed();
            if now < ready_at {
                waited = ready_at - now;
                log::trace!("Rate limit: waiting {waited:?}");
                self.clock.sleep(waited).await;
            }
        }

        self.last = Some(self.clock.elapsed());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(ms: u64) -> (MinIntervalGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let gate = MinIntervalGate::new(Duration::from_millis(ms), clock.clone());
        (gate, clock)
    }

    #[tokio::test]
    async fn first_call_does_not_wait() {
        let (mut gate, clock) = gate(1000);
        assert_eq!(gate.wait().await, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn back_to_back_calls_wait_full_interval() {
        let (mut gate, clock) = gate(1000);
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(1000), Duration::from_millis(1000)]
        );
        assert_eq!(clock.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn time_spent_in_request_counts_toward_interval() {
        let (mut gate, clock) = gate(1000);
        gate.wait().await;
        clock.advance(Duration::from_millis(300));
        assert_eq!(gate.wait().await, Duration::from_millis(700));
    }

    #[tokio::test]
    async fn slow_request_needs_no_wait() {
        let (mut gate, clock) = gate(1000);
        gate.wait().await;
        clock.advance(Duration::from_millis(2500));
        assert_eq!(gate.wait().await, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn consecutive_calls_are_spaced_by_at_least_the_interval() {
        let (mut gate, clock) = gate(1000);
        let mut starts = Vec::new();
        for step in [0u64, 100, 1200, 0, 999] {
            clock.advance(Duration::from_millis(step));
            gate.wait().await;
            starts.push(clock.elapsed());
        }
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test]
    async fn system_clock_sleeps() {
        let mut gate = MinIntervalGate::system(Duration::from_millis(50));
        gate.wait().await;
        let waited = gate.wait().await;
        assert!(waited > Duration::ZERO);
        assert!(waited <= Duration::from_millis(50));
    }
}
