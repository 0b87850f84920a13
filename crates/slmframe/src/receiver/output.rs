use std::fmt;

use crate::frame::{DecodeResult, Measurement};
use crate::source::Arrival;
use crate::violation::Violation;

/// Which sampling window kept a measurement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Series {
    /// Fine-resolution window: logging and violation detection
    Fine,

    /// Compliance-resolution window: regulatory reporting
    Compliance,
}

impl AsRef<str> for Series {
    fn as_ref(&self) -> &str {
        match self {
            Series::Fine => "fine",
            Series::Compliance => "compliance",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

/// A measurement kept by one sampling window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sample {
    /// Window which kept the measurement
    pub series: Series,

    /// The measurement
    pub measurement: Measurement,
}

/// Everything the receiver learned from one frame
///
/// Every completed frame produces exactly one `ReceiverEvent`, even
/// if the frame was empty or undecodable. The
/// [`decoded()`](ReceiverEvent::decoded) result is always present.
/// If the frame carried a sound level, one or both sampling windows
/// may have kept it, and keeping a fine sample may have raised a
/// [`Violation`].
///
/// When both windows keep the same measurement, both
/// [`fine()`](ReceiverEvent::fine) and
/// [`compliance()`](ReceiverEvent::compliance) are reported.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiverEvent {
    decoded: DecodeResult,
    arrival: Arrival,
    fine: Option<Sample>,
    compliance: Option<Sample>,
    violation: Option<Violation>,
}

impl ReceiverEvent {
    pub(crate) fn new(decoded: DecodeResult, arrival: Arrival) -> Self {
        Self {
            decoded,
            arrival,
            fine: None,
            compliance: None,
            violation: None,
        }
    }

    pub(crate) fn with_fine(&mut self, measurement: Measurement, violation: Option<Violation>) {
        self.fine = Some(Sample {
            series: Series::Fine,
            measurement,
        });
        self.violation = violation;
    }

    pub(crate) fn with_compliance(&mut self, measurement: Measurement) {
        self.compliance = Some(Sample {
            series: Series::Compliance,
            measurement,
        });
    }

    /// What the frame contained
    pub fn decoded(&self) -> &DecodeResult {
        &self.decoded
    }

    /// When the frame was completed
    pub fn arrival(&self) -> &Arrival {
        &self.arrival
    }

    /// The frame's measurement, whether or not it was kept
    pub fn measurement(&self) -> Option<Measurement> {
        self.decoded.clone().into_measurement(self.arrival.wall)
    }

    /// Fine-resolution sample, if kept
    pub fn fine(&self) -> Option<&Sample> {
        self.fine.as_ref()
    }

    /// Compliance-resolution sample, if kept
    pub fn compliance(&self) -> Option<&Sample> {
        self.compliance.as_ref()
    }

    /// Every sample kept from this frame, fine first
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.fine.iter().chain(self.compliance.iter())
    }

    /// Violation raised by this frame, if any
    pub fn violation(&self) -> Option<&Violation> {
        self.violation.as_ref()
    }

    /// True if anything needs to be written out
    pub fn has_output(&self) -> bool {
        self.fine.is_some() || self.compliance.is_some()
    }
}

impl fmt::Display for ReceiverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<10}]: {}", self.arrival.mono_ms, self.decoded)?;
        for sample in self.samples() {
            write!(f, " [{}]", sample.series)?;
        }
        if let Some(violation) = &self.violation {
            write!(f, " {}", violation)?;
        }
        Ok(())
    }
}
