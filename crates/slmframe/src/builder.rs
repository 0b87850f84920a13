use crate::receiver::SlmReceiver;

/// Builds a sound level meter receiver
///
/// The builder comes with a sensible set of default options:
///
/// * fine sampling period: one second
/// * compliance sampling period: one minute
/// * violation threshold: 85 dB
///
/// The API specified by the builder is part of this crate's
/// API. The actual default values are *not*, however, and
/// are subject to revision in any minor release. If you
/// care very strongly about a setting, be sure to configure
/// it here.
///
/// ```
/// use slmframe::SlmReceiverBuilder;
///
/// let receiver = SlmReceiverBuilder::new()
///     .with_fine_period_ms(500)
///     .with_threshold_db(70.0)
///     .build_at(10_000);
/// assert_eq!(10_500, receiver.scheduler().fine().next_due_ms());
/// assert_eq!(70.0, receiver.detector().threshold_db());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SlmReceiverBuilder {
    fine_period_ms: u64,
    compliance_period_ms: u64,
    threshold_db: f64,
}

impl SlmReceiverBuilder {
    /// New receiver chain with "sensible" defaults
    pub fn new() -> Self {
        Self {
            fine_period_ms: 1000,
            compliance_period_ms: 60_000,
            threshold_db: 85.0,
        }
    }

    /// Build a receiver chain whose clock starts at zero
    ///
    /// Once built, the receiver chain is immediately ready to
    /// accept bytes.
    pub fn build(&self) -> SlmReceiver {
        SlmReceiver::from(self)
    }

    /// Build a receiver chain whose clock starts at `start_ms`
    ///
    /// `start_ms` is the monotonic time, in milliseconds, at which
    /// logging begins. Both sampling windows fall due one period
    /// after it.
    pub fn build_at(&self, start_ms: u64) -> SlmReceiver {
        SlmReceiver::new(
            self.fine_period_ms,
            self.compliance_period_ms,
            self.threshold_db,
            start_ms,
        )
    }

    /// Fine sampling period (milliseconds)
    ///
    /// At most one sound level per period is kept as a fine
    /// sample. Fine samples are logged and drive violation
    /// detection. Zero is treated as one millisecond.
    pub fn with_fine_period_ms(&mut self, period_ms: u64) -> &mut Self {
        self.fine_period_ms = u64::max(period_ms, 1);
        self
    }

    /// Compliance sampling period (milliseconds)
    ///
    /// At most one sound level per period is kept as a
    /// compliance sample. Zero is treated as one millisecond.
    pub fn with_compliance_period_ms(&mut self, period_ms: u64) -> &mut Self {
        self.compliance_period_ms = u64::max(period_ms, 1);
        self
    }

    /// Violation threshold (dB)
    ///
    /// A violation is raised whenever the median of the last
    /// four fine samples is strictly greater than this level.
    pub fn with_threshold_db(&mut self, threshold_db: f64) -> &mut Self {
        self.threshold_db = threshold_db;
        self
    }

    /// Fine sampling period (milliseconds)
    pub fn fine_period_ms(&self) -> u64 {
        self.fine_period_ms
    }

    /// Compliance sampling period (milliseconds)
    pub fn compliance_period_ms(&self) -> u64 {
        self.compliance_period_ms
    }

    /// Violation threshold (dB)
    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }
}

impl Default for SlmReceiverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = SlmReceiverBuilder::default();
        assert_eq!(1000, builder.fine_period_ms());
        assert_eq!(60_000, builder.compliance_period_ms());
        assert_eq!(85.0, builder.threshold_db());

        let rx = builder.build();
        assert_eq!(1000, rx.scheduler().fine().next_due_ms());
        assert_eq!(60_000, rx.scheduler().compliance().next_due_ms());
    }

    #[test]
    fn test_zero_periods() {
        let mut builder = SlmReceiverBuilder::new();
        builder
            .with_fine_period_ms(0)
            .with_compliance_period_ms(0);
        assert_eq!(1, builder.fine_period_ms());
        assert_eq!(1, builder.compliance_period_ms());
    }
}
