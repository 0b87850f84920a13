//! Noise limit violations

use std::fmt;

use arraydeque::{ArrayDeque, Wrapping};
use chrono::{DateTime, Utc};

use crate::level::Decibels;

/// Number of fine samples in the rolling median
pub const ROLLING_SAMPLES: usize = 4;

/// The most recent fine-resolution samples
///
/// Holds at most [`ROLLING_SAMPLES`] levels. Pushing onto a full
/// buffer evicts the oldest level.
#[derive(Clone, Debug)]
pub struct RollingSampleBuffer {
    samples: ArrayDeque<Decibels, ROLLING_SAMPLES, Wrapping>,
}

impl RollingSampleBuffer {
    /// New, empty buffer
    pub fn new() -> Self {
        Self {
            samples: ArrayDeque::new(),
        }
    }

    /// Push the newest sample, returning the evicted one, if any
    pub fn push(&mut self, level: Decibels) -> Option<Decibels> {
        self.samples.push_back(level)
    }

    /// Median of the buffer, in dB
    ///
    /// Only computed once the buffer is full. With an even sample
    /// count, the median is the mean of the two middle samples.
    pub fn median(&self) -> Option<f64> {
        if !self.samples.is_full() {
            return None;
        }

        let mut sorted = [Decibels::default(); ROLLING_SAMPLES];
        for (dst, src) in sorted.iter_mut().zip(self.samples.iter()) {
            *dst = *src;
        }
        sorted.sort_unstable();

        let mid = ROLLING_SAMPLES / 2;
        let sum_tenths = sorted[mid - 1].tenths() as u32 + sorted[mid].tenths() as u32;
        Some(sum_tenths as f64 / 20.0)
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no samples are held
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Decibels> {
        self.samples.iter()
    }

    /// Forget all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for RollingSampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// A noise limit violation
///
/// Raised when the median of the last four fine samples is strictly
/// greater than the configured limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Violation {
    /// Rolling median which exceeded the limit, in dB
    pub median_db: f64,

    /// Arrival time of the sample which completed the window
    pub at: DateTime<Utc>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VIOLATION: Median Noise Level of {:.1} dB", self.median_db)
    }
}

/// Rolling-median violation detector
///
/// Every fine-resolution sample is pushed onto a
/// [`RollingSampleBuffer`]. Once the buffer is full, each new sample
/// re-evaluates the median. There is no hold-off: a noise source
/// which stays loud raises a violation on every fine sample.
///
/// ```
/// use slmframe::{Decibels, ViolationDetector};
/// # let now = chrono::Utc::now();
///
/// let mut det = ViolationDetector::new(85.0);
/// let mut out = None;
/// for tenths in [700, 950, 800, 960] {
///     out = det.input(Decibels::from_tenths(tenths), now);
/// }
/// assert_eq!(87.5, out.expect("violation").median_db);
/// ```
#[derive(Clone, Debug)]
pub struct ViolationDetector {
    buffer: RollingSampleBuffer,
    threshold_db: f64,
}

impl ViolationDetector {
    /// New detector with a limit of `threshold_db`
    pub fn new(threshold_db: f64) -> Self {
        Self {
            buffer: RollingSampleBuffer::new(),
            threshold_db,
        }
    }

    /// Handle a fine-resolution sample which arrived `at`
    pub fn input(&mut self, level: Decibels, at: DateTime<Utc>) -> Option<Violation> {
        self.buffer.push(level);
        let median_db = self.buffer.median()?;
        if median_db > self.threshold_db {
            Some(Violation { median_db, at })
        } else {
            None
        }
    }

    /// Violation limit, in dB
    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    /// Rolling sample buffer
    pub fn buffer(&self) -> &RollingSampleBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;
    use chrono::TimeZone;

    fn db(whole: u16) -> Decibels {
        Decibels::from_tenths(whole * 10)
    }

    #[test]
    fn test_buffer_eviction() {
        let mut buf = RollingSampleBuffer::new();
        for v in [70, 95, 80, 96] {
            assert_eq!(None, buf.push(db(v)));
        }
        assert_eq!(4, buf.len());
        assert_eq!(Some(db(70)), buf.push(db(60)));

        let held: Vec<Decibels> = buf.iter().copied().collect();
        assert_eq!(vec![db(95), db(80), db(96), db(60)], held);
    }

    #[test]
    fn test_median_needs_full_buffer() {
        let mut buf = RollingSampleBuffer::new();
        assert!(buf.is_empty());
        for v in [70, 95, 80] {
            buf.push(db(v));
            assert_eq!(None, buf.median());
        }
        buf.push(db(96));
        assert_approx_eq!(87.5f64, buf.median().unwrap());

        buf.clear();
        assert_eq!(None, buf.median());
    }

    #[test]
    fn test_median_fractional() {
        let mut buf = RollingSampleBuffer::new();
        for t in [651, 652, 653, 700] {
            buf.push(Decibels::from_tenths(t));
        }
        assert_approx_eq!(65.25f64, buf.median().unwrap());
    }

    #[test]
    fn test_detector_retriggers() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 22, 15, 0).unwrap();
        let mut det = ViolationDetector::new(85.0);

        assert_eq!(None, det.input(db(70), at));
        assert_eq!(None, det.input(db(95), at));
        assert_eq!(None, det.input(db(80), at));
        let first = det.input(db(96), at).expect("expected violation");
        assert_approx_eq!(87.5f64, first.median_db);
        assert_eq!(at, first.at);

        // 70 is evicted; [95, 80, 96, 60] still has median 87.5
        let second = det.input(db(60), at).expect("expected violation");
        assert_approx_eq!(87.5f64, second.median_db);

        assert_eq!(
            "VIOLATION: Median Noise Level of 87.5 dB",
            second.to_string()
        );
    }

    #[test]
    fn test_detector_is_strict() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 22, 15, 0).unwrap();
        let mut det = ViolationDetector::new(85.0);
        for v in [85, 85, 85, 85] {
            assert_eq!(None, det.input(db(v), at));
        }
        assert_eq!(85.0, det.threshold_db());
        assert_eq!(4, det.buffer().len());
    }
}
