//! Jittered exponential backoff for the lookup-or-create loop

use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use super::config::RetryOptions;

/// One retry loop's backoff state.
#[derive(Debug)]
pub struct Retry {
    opts: RetryOptions,
    current: Duration,
    started: Instant,
    attempts: u32,
}

impl Retry {
    pub fn start(opts: &RetryOptions) -> Self {
        Self {
            current: opts.initial_backoff(),
            opts: opts.clone(),
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Attempts that have backed off so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleep before the next attempt. Returns false once `max_elapsed`
    /// has passed, without sleeping.
    pub fn next(&mut self) -> bool {
        if let Some(limit) = self.opts.max_elapsed() {
            if self.started.elapsed() >= limit {
                return false;
            }
        }
        thread::sleep(self.jittered());
        self.attempts += 1;
        let grown = (self.current.as_nanos() as f64 * self.opts.multiplier) as u64;
        self.current = Duration::from_nanos(grown).min(self.opts.max_backoff());
        true
    }

    /// The delay the next `next()` would sleep, before jitter.
    pub fn current_backoff(&self) -> Duration {
        self.current
    }

    fn jittered(&self) -> Duration {
        let factor = self.opts.randomization_factor;
        if factor <= 0.0 {
            return self.current;
        }
        let scale = rand::thread_rng().gen_range((1.0 - factor)..=(1.0 + factor));
        Duration::from_secs_f64(self.current.as_secs_f64() * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_to_cap() {
        let opts = RetryOptions {
            initial_backoff_us: 1,
            max_backoff_ms: 1,
            randomization_factor: 0.0,
            ..Default::default()
        };
        let mut retry = Retry::start(&opts);
        assert_eq!(retry.current_backoff(), Duration::from_micros(1));

        assert!(retry.next());
        assert_eq!(retry.current_backoff(), Duration::from_micros(2));

        for _ in 0..20 {
            assert!(retry.next());
        }
        assert_eq!(retry.current_backoff(), Duration::from_millis(1));
        assert_eq!(retry.attempts(), 21);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let opts = RetryOptions {
            initial_backoff_us: 1000,
            ..Default::default()
        };
        let retry = Retry::start(&opts);
        for _ in 0..100 {
            let d = retry.jittered();
            assert!(d >= Duration::from_micros(849), "{:?}", d);
            assert!(d <= Duration::from_micros(1151), "{:?}", d);
        }
    }

    #[test]
    fn test_max_elapsed_stops_loop() {
        let opts = RetryOptions {
            max_elapsed_ms: Some(0),
            ..Default::default()
        };
        let mut retry = Retry::start(&opts);
        assert!(!retry.next());
        assert_eq!(retry.attempts(), 0);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut retry = Retry::start(&RetryOptions::default());
        for _ in 0..5 {
            assert!(retry.next());
        }
    }
}
