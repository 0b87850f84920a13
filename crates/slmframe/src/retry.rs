//! Retry with delay

use std::fmt;
use std::time::Duration;

use log::warn;
use thiserror::Error;

/// Waits between retry attempts
///
/// Production code sleeps the thread with [`ThreadDelay`]. Tests
/// substitute a fake which records the requested delays instead.
pub trait Delay {
    /// Wait for `duration`
    fn delay(&mut self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How many times to try, and how long to wait in between
///
/// ```
/// use std::time::Duration;
/// use slmframe::{Delay, RetryPolicy};
///
/// struct NoDelay;
/// impl Delay for NoDelay {
///     fn delay(&mut self, _: Duration) {}
/// }
///
/// let policy = RetryPolicy::bounded(3, Duration::from_secs(5));
/// let out = policy.run(&mut NoDelay, |attempt| {
///     if attempt < 3 { Err("not yet") } else { Ok(attempt) }
/// });
/// assert_eq!(3, out.unwrap());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    delay: Duration,
}

impl RetryPolicy {
    /// New policy
    ///
    /// A `max_attempts` of `None` retries forever. `Some(0)` is
    /// treated as a single attempt.
    pub fn new(max_attempts: Option<u32>, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.map(|n| u32::max(n, 1)),
            delay,
        }
    }

    /// Retry until success, forever if need be
    pub fn unbounded(delay: Duration) -> Self {
        Self::new(None, delay)
    }

    /// Give up after `max_attempts`
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self::new(Some(max_attempts), delay)
    }

    /// Run `op` until it succeeds or the policy runs out of patience
    ///
    /// `op` receives the one-based attempt number. Each failure is
    /// logged. The `delay` is applied after every failed attempt
    /// except the last.
    pub fn run<T, E, F>(&self, delay: &mut dyn Delay, mut op: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op(attempt) {
                Ok(out) => return Ok(out),
                Err(err) => {
                    warn!("retry: attempt {} failed: {}", attempt, err);
                    if self.max_attempts.map_or(false, |max| attempt >= max) {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }
                }
            }
            delay.delay(self.delay);
            attempt = attempt.saturating_add(1);
        }
    }

    /// Maximum attempts, or `None` for no limit
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Retries ran out
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Every attempt failed
    #[error("gave up after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,

        /// Error from the final attempt
        last: E,
    },
}
