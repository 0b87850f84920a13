//! Fixed-period sampling windows
//!
//! The meter reports a new level several times per second, but we
//! only want to *keep* one level per sampling period. Each
//! [`SamplingWindow`] has two states:
//!
//! ```txt
//!          now >= next_due
//! +---------+ ========> +-------+
//! | Pending |           |  Due  |
//! +---------+ <======== +-------+
//!    measurement accepted;
//!    next_due += period
//! ```
//!
//! A measurement that arrives while the window is `Pending` is
//! discarded for that window. The [`SampleScheduler`] runs two
//! windows, *fine* and *compliance*, against the same clock. The
//! windows never look at each other: one measurement may be kept by
//! neither, either, or both.
//!
//! Time is measured in milliseconds on a monotonic clock whose epoch
//! is fixed when the process starts.

/// One fixed-period sampling window
///
/// ```
/// use slmframe::SamplingWindow;
///
/// let mut wnd = SamplingWindow::new(1000, 0);
/// assert!(!wnd.offer(999));
/// assert!(wnd.offer(1000));
/// assert_eq!(2000, wnd.next_due_ms());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SamplingWindow {
    period_ms: u64,
    next_due_ms: u64,
}

impl SamplingWindow {
    /// New window
    ///
    /// The first sample is due one `period_ms` after `start_ms`.
    /// A zero period is raised to one millisecond.
    pub fn new(period_ms: u64, start_ms: u64) -> Self {
        let period_ms = u64::max(period_ms, 1);
        Self {
            period_ms,
            next_due_ms: start_ms.saturating_add(period_ms),
        }
    }

    /// True if a measurement arriving at `now_ms` would be kept
    pub fn is_due_at(&self, now_ms: u64) -> bool {
        self.next_due_ms <= now_ms
    }

    /// Offer a measurement which arrived at `now_ms`
    ///
    /// If the window is due, the measurement is accepted, the due
    /// time advances by exactly one period, and `true` is returned.
    /// Otherwise the measurement is discarded for this window.
    ///
    /// Because the due time advances by one period per accepted
    /// sample, a window which fell behind (e.g., while the meter was
    /// disconnected) accepts consecutive measurements until it has
    /// caught up with the clock.
    pub fn offer(&mut self, now_ms: u64) -> bool {
        if self.is_due_at(now_ms) {
            self.next_due_ms = self.next_due_ms.saturating_add(self.period_ms);
            true
        } else {
            false
        }
    }

    /// Sampling period, in milliseconds
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Time at which the next sample is due, in milliseconds
    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }
}

/// Which windows accepted a measurement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Schedule {
    /// Kept as a fine-resolution sample
    pub fine: bool,

    /// Kept as a compliance-resolution sample
    pub compliance: bool,
}

impl Schedule {
    /// True if neither window accepted the measurement
    pub fn is_discarded(&self) -> bool {
        !self.fine && !self.compliance
    }
}

/// Fine and compliance sampling windows
///
/// The compliance period is normally a multiple of the fine
/// period, but nothing here requires it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SampleScheduler {
    fine: SamplingWindow,
    compliance: SamplingWindow,
}

impl SampleScheduler {
    /// New scheduler with both windows starting at `start_ms`
    pub fn new(fine_period_ms: u64, compliance_period_ms: u64, start_ms: u64) -> Self {
        Self {
            fine: SamplingWindow::new(fine_period_ms, start_ms),
            compliance: SamplingWindow::new(compliance_period_ms, start_ms),
        }
    }

    /// Offer a measurement which arrived at `now_ms` to both windows
    pub fn schedule(&mut self, now_ms: u64) -> Schedule {
        Schedule {
            fine: self.fine.offer(now_ms),
            compliance: self.compliance.offer(now_ms),
        }
    }

    /// Fine-resolution window
    pub fn fine(&self) -> &SamplingWindow {
        &self.fine
    }

    /// Compliance-resolution window
    pub fn compliance(&self) -> &SamplingWindow {
        &self.compliance
    }
}
