//! Exponential-with-jitter backoff, spec.md §4.1: "reconnect (exponential-with-jitter
//! backoff, initial 5 s)".

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            attempt: 0,
        }
    }

    /// Kestrel's standard reconnect backoff: 5s initial, doubling, capped at 60s.
    pub fn reconnect() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(60))
    }

    /// Resets the attempt counter, e.g. after a connection stays healthy.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Computes the next delay and advances the internal attempt counter.
    ///
    /// Jitter is applied as a uniform random factor in `[0.5, 1.0]` of the
    /// un-jittered delay, so concurrent reconnecting consumers don't
    /// thunder-herd the venue.
    pub fn next_delay(&mut self) -> Duration {
        let unjittered = self
            .initial
            .mul_f64(self.multiplier.powi(self.attempt as i32))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        let jitter = rand::rng().random_range(0.5..=1.0);
        unjittered.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_stay_capped() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(20));
        let mut prev_upper_bound = Duration::ZERO;
        for _ in 0..10 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_secs(20));
            prev_upper_bound = prev_upper_bound.max(delay);
        }
        assert!(prev_upper_bound > Duration::ZERO);
    }

    #[test]
    fn reset_restarts_from_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_secs(5));
    }
}
