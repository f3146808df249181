use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff over a bounded retry budget.
///
/// The n-th retry (0-based) waits `initial_delay * multiplier^n`, capped at
/// `max_delay` and scaled by the configured jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    retries: u32,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            config: config.clone(),
            retries: 0,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.config.max_retries {
            return None;
        }

        let delay = jittered(self.base_delay(self.retries), self.config.jitter);
        self.retries += 1;
        Some(delay)
    }

    /// Delay before retry `n` without jitter
    pub fn base_delay(&self, n: u32) -> Duration {
        let initial = self.config.initial_delay().as_secs_f64();
        let factor = self.config.multiplier.powi(n.min(i32::MAX as u32) as i32);
        let max = self.config.max_delay();

        let delay = initial * factor;
        if !delay.is_finite() || delay >= max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Retries handed out so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn reset(&mut self) {
        self.retries = 0;
    }
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }

    let scale = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
    delay.mul_f64(scale.max(0.0))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Backoff;
    use crate::config::BackoffConfig;

    fn config(jitter: f64) -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 60_000,
            max_retries: 5,
            jitter,
        }
    }

    #[test]
    fn test_exponential_delays() {
        let mut backoff = Backoff::new(&config(0.0));
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();

        assert_eq!(
            delays,
            [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
        );
        assert_eq!(backoff.retries(), 5);
        assert_eq!(backoff.next_delay(), None);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_delay_capped() {
        let backoff = Backoff::new(&config(0.0));
        assert_eq!(backoff.base_delay(6), Duration::from_secs(60));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_bounds() {
        let mut backoff = Backoff::new(&config(0.5));
        for n in 0..5 {
            let base = Duration::from_secs(1 << n);
            let delay = backoff.next_delay().unwrap();
            assert!(delay >= base.mul_f64(0.5) && delay <= base.mul_f64(1.5));
        }
    }

    #[test]
    fn test_zero_retries() {
        let mut backoff = Backoff::new(&BackoffConfig {
            max_retries: 0,
            ..config(0.0)
        });
        assert_eq!(backoff.next_delay(), None);
    }
}
