use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
/// Produces human-like delays and scroll distances.
pub struct BehavioralEngine {}

impl BehavioralEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Uniform draw from the inclusive range; reversed bounds are swapped.
    pub fn pick(&self, min: u64, max: u64) -> u64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        OsRng.gen_range(lo..=hi)
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    ///
    /// Returns the slept duration so callers can log it.
    pub async fn random_delay(&self, min: u64, max: u64) -> Duration {
        let ms = self.pick(min, max);
        let delay = Duration::from_millis(ms);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        delay
    }

    /// Pixel distance for the next scroll step.
    pub fn scroll_delta(&self, min: u64, max: u64) -> i64 {
        i64::try_from(self.pick(min, max)).unwrap_or(i64::MAX)
    }
}
