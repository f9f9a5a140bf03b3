use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Epoch milliseconds derived from a monotonic anchor.
///
/// Reads the system clock once, then advances with `tokio::time::Instant`, so
/// a paused test runtime moves it deterministically. A `rate` above 1.0 runs
/// the clock faster than real time.
#[derive(Debug, Clone, Copy)]
pub struct EpochClock {
    base_epoch_ms: u64,
    base: Instant,
    rate: f64,
}

impl EpochClock {
    pub fn new() -> Self {
        let base_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::starting_at(base_epoch_ms)
    }

    pub fn starting_at(base_epoch_ms: u64) -> Self {
        Self {
            base_epoch_ms,
            base: Instant::now(),
            rate: 1.0,
        }
    }

    /// Same anchor, running `rate` times faster. Non-positive rates are
    /// treated as 1.0.
    pub fn with_rate(self, rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        Self { rate, ..self }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn now_ms(&self) -> u64 {
        let elapsed = self.base.elapsed().as_millis() as f64 * self.rate;
        self.base_epoch_ms + elapsed as u64
    }

    /// Real time that corresponds to `clock` time on this clock.
    pub fn real(&self, clock: Duration) -> Duration {
        clock.div_f64(self.rate)
    }
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn advances_with_tokio_time() {
        let clock = EpochClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert_eq!(clock.now_ms(), 3_500);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_scales_elapsed_time() {
        let clock = EpochClock::starting_at(0).with_rate(10.0);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(clock.now_ms(), 1_000);
        assert_eq!(clock.real(Duration::from_secs(1)), Duration::from_millis(100));
    }

    #[test]
    fn invalid_rate_falls_back_to_real_time() {
        let clock = EpochClock::starting_at(0).with_rate(0.0);
        assert_eq!(clock.rate(), 1.0);
    }
}
