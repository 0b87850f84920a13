//! Full receiver chain

#[cfg(not(test))]
use log::{debug, trace, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as trace;
#[cfg(test)]
use std::println as warn;

use std::convert::From;
use std::fmt;

mod output;

pub use output::{ReceiverEvent, Sample, Series};

use crate::builder::SlmReceiverBuilder;
use crate::deframer::Deframer;
use crate::frame::{DecodeResult, Frame};
use crate::source::{Arrival, Clock};
use crate::violation::ViolationDetector;
use crate::window::SampleScheduler;

/// A complete sound level meter receiver chain
///
/// The receive chain takes bytes from the meter and performs the
/// following operations:
///
/// 1. Deframing on the [`SENTINEL`](crate::SENTINEL) byte
/// 2. Decoding of each frame, which may yield a sound level
/// 3. Fine and compliance sampling windows, which decide which
///    sound levels to keep
/// 4. Rolling-median violation detection on the fine samples
///
/// Every completed frame produces one [`ReceiverEvent`].
///
/// To create the receiver, first create its Builder:
///
/// ```
/// use slmframe::SlmReceiverBuilder;
///
/// let receiver = SlmReceiverBuilder::default().build_at(0);
/// assert_eq!(1000, receiver.scheduler().fine().next_due_ms());
/// ```
#[derive(Clone, Debug)]
pub struct SlmReceiver {
    deframer: Deframer,
    scheduler: SampleScheduler,
    detector: ViolationDetector,
    stats: ReceiverStats,
}

impl SlmReceiver {
    /// Handle one received byte
    ///
    /// `arrival` is the time at which the byte was read. If `data`
    /// completes a frame, the frame is processed as though it
    /// arrived at `arrival`, and its [`ReceiverEvent`] is returned.
    pub fn input(&mut self, data: u8, arrival: Arrival) -> Option<ReceiverEvent> {
        let frame = self.deframer.input(data)?;
        Some(self.process(&frame, arrival))
    }

    /// Handle a completed frame
    ///
    /// Decodes the `frame` and offers any sound level to the
    /// sampling windows. Fine samples feed the violation detector.
    pub fn process(&mut self, frame: &Frame, arrival: Arrival) -> ReceiverEvent {
        self.stats.frames += 1;
        self.stats.truncated_bytes += frame.truncated() as u64;

        let decoded = frame.decode();
        match &decoded {
            DecodeResult::Empty => {
                self.stats.empty += 1;
                trace!("receiver [{:<10}]: empty frame", arrival.mono_ms);
            }
            DecodeResult::NoiseLevel(_) => {
                self.stats.measurements += 1;
            }
            DecodeResult::TooShort(_) => {
                self.stats.malformed += 1;
                warn!(
                    "receiver [{:<10}]: malformed frame: {} ({})",
                    arrival.mono_ms,
                    decoded,
                    frame.to_hex()
                );
            }
            DecodeResult::UnknownKey(_, _) => {
                self.stats.unknown += 1;
                debug!("receiver [{:<10}]: {}", arrival.mono_ms, decoded);
            }
            DecodeResult::Recognized(_, _) => {
                self.stats.recognized += 1;
                debug!("receiver [{:<10}]: {}", arrival.mono_ms, decoded);
            }
        }

        let mut out = ReceiverEvent::new(decoded, arrival);
        let measurement = match out.measurement() {
            Some(m) => m,
            None => return out,
        };

        let schedule = self.scheduler.schedule(arrival.mono_ms);
        if schedule.fine {
            let violation = self
                .detector
                .input(measurement.level, measurement.arrival_time);
            if let Some(v) = &violation {
                warn!("receiver [{:<10}]: {}", arrival.mono_ms, v);
            }
            out.with_fine(measurement, violation);
        }
        if schedule.compliance {
            out.with_compliance(measurement);
        }
        if schedule.is_discarded() {
            self.stats.discarded += 1;
        }

        out
    }

    /// Receive from a source of bytes
    ///
    /// Bind an iterator which will consume the `input` and produce
    /// one [`ReceiverEvent`] per completed frame. Frames are
    /// timestamped with `clock` at the moment they complete.
    ///
    /// The iterator consumes as many bytes of `input` as are needed
    /// to produce the next event. It returns `None` if the input is
    /// exhausted. A partial frame stays buffered for the next call.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter<'rx, 'c, I, T, C>(&'rx mut self, input: I, clock: &'c C) -> SourceIter<'rx, 'c, T, C>
    where
        I: IntoIterator<Item = u8> + IntoIterator<IntoIter = T>,
        T: Iterator<Item = u8>,
        C: Clock + ?Sized,
    {
        SourceIter {
            source: input.into_iter(),
            receiver: self,
            clock,
        }
    }

    /// Discard any partially-received frame
    ///
    /// Call after the byte source is restored. The sampling windows
    /// and the rolling median are *not* reset: they run on the
    /// clock, not on the byte stream.
    pub fn reset(&mut self) {
        let discarded = self.deframer.reset();
        self.stats.discarded_bytes += discarded as u64;
    }

    /// Lifetime receiver counters
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Sampling windows
    pub fn scheduler(&self) -> &SampleScheduler {
        &self.scheduler
    }

    /// Violation detector
    pub fn detector(&self) -> &ViolationDetector {
        &self.detector
    }
}

impl From<&SlmReceiverBuilder> for SlmReceiver {
    /// Create the receiver from its Builder
    ///
    /// The sampling windows start at monotonic time zero.
    fn from(cfg: &SlmReceiverBuilder) -> Self {
        cfg.build_at(0)
    }
}

impl SlmReceiver {
    pub(crate) fn new(
        fine_period_ms: u64,
        compliance_period_ms: u64,
        threshold_db: f64,
        start_ms: u64,
    ) -> Self {
        Self {
            deframer: Deframer::new(),
            scheduler: SampleScheduler::new(fine_period_ms, compliance_period_ms, start_ms),
            detector: ViolationDetector::new(threshold_db),
            stats: ReceiverStats::default(),
        }
    }
}

/// Lifetime receiver counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReceiverStats {
    /// Frames completed, including empty frames
    pub frames: u64,

    /// Empty frames
    pub empty: u64,

    /// Sound levels decoded
    pub measurements: u64,

    /// Sound levels which neither sampling window kept
    pub discarded: u64,

    /// Noise level frames which were too short to decode
    pub malformed: u64,

    /// Frames with a key we have never seen
    pub unknown: u64,

    /// Frames with a known key which is not decoded
    pub recognized: u64,

    /// Partial-frame bytes thrown away by [`SlmReceiver::reset()`]
    pub discarded_bytes: u64,

    /// Bytes dropped from frames which were too long
    pub truncated_bytes: u64,
}

impl fmt::Display for ReceiverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames ({} empty), {} levels ({} not sampled), {} malformed, {} unknown, {} other",
            self.frames,
            self.empty,
            self.measurements,
            self.discarded,
            self.malformed,
            self.unknown,
            self.recognized
        )
    }
}

/// Byte source iterator
///
/// This iterator is bound to a source of bytes from the meter.
/// Calling the `next()` method returns the next [`ReceiverEvent`]
/// or `None` if the available bytes have been consumed without
/// completing another frame.
#[derive(Debug)]
pub struct SourceIter<'rx, 'c, I, C>
where
    I: Iterator<Item = u8>,
    C: Clock + ?Sized,
{
    source: I,
    receiver: &'rx mut SlmReceiver,
    clock: &'c C,
}

impl<'rx, 'c, I, C> Iterator for SourceIter<'rx, 'c, I, C>
where
    I: Iterator<Item = u8>,
    C: Clock + ?Sized,
{
    type Item = ReceiverEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for byte in &mut self.source {
            if let Some(frame) = self.receiver.deframer.input(byte) {
                return Some(self.receiver.process(&frame, self.clock.now()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use assert_approx_eq::assert_approx_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::frame::{NOISE_LEVEL_KEY, SENTINEL};
    use crate::level::Decibels;

    // advances by a fixed step every time it is read
    struct StepClock {
        base: DateTime<Utc>,
        step_ms: u64,
        now_ms: Cell<u64>,
    }

    impl StepClock {
        fn new(step_ms: u64) -> Self {
            Self {
                base: Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap(),
                step_ms,
                now_ms: Cell::new(0),
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Arrival {
            let now = self.now_ms.get() + self.step_ms;
            self.now_ms.set(now);
            Arrival {
                wall: self.base + Duration::milliseconds(now as i64),
                mono_ms: now,
            }
        }
    }

    fn at(mono_ms: u64) -> Arrival {
        Arrival {
            wall: Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap()
                + Duration::milliseconds(mono_ms as i64),
            mono_ms,
        }
    }

    fn level_frame(bcd_hi: u8, bcd_lo: u8) -> Frame {
        Frame::from(&[NOISE_LEVEL_KEY, bcd_hi, bcd_lo][..])
    }

    #[test]
    fn test_input_one_frame() {
        let mut rx = SlmReceiverBuilder::default().build_at(0);
        assert!(rx.input(NOISE_LEVEL_KEY, at(1000)).is_none());
        assert!(rx.input(0x07, at(1000)).is_none());
        assert!(rx.input(0x24, at(1000)).is_none());

        let evt = rx.input(SENTINEL, at(1000)).expect("expected event");
        assert_eq!(Some(Decibels::from_tenths(724)), evt.decoded().level());
        let fine = evt.fine().expect("expected fine sample");
        assert_eq!(Series::Fine, fine.series);
        assert_eq!(at(1000).wall, fine.measurement.arrival_time);
        assert!(evt.compliance().is_none());
        assert!(evt.violation().is_none());
        assert_eq!(1, rx.stats().measurements);
    }

    #[test]
    fn test_process_sampling() {
        let mut rx = SlmReceiverBuilder::default()
            .with_compliance_period_ms(2000)
            .build_at(0);

        let frame = level_frame(0x06, 0x51);
        let kept: Vec<(u64, usize)> = [0u64, 400, 999, 1000, 1500, 2000]
            .into_iter()
            .map(|t| (t, rx.process(&frame, at(t)).samples().count()))
            .collect();
        assert_eq!(
            vec![(0, 0), (400, 0), (999, 0), (1000, 1), (1500, 0), (2000, 2)],
            kept
        );
        assert_eq!(6, rx.stats().measurements);
        assert_eq!(4, rx.stats().discarded);
    }

    #[test]
    fn test_process_other_frames() {
        let mut rx = SlmReceiverBuilder::default().build_at(0);

        let evt = rx.process(&Frame::default(), at(5000));
        assert_eq!(&DecodeResult::Empty, evt.decoded());
        assert!(!evt.has_output());

        let evt = rx.process(&Frame::from(&[NOISE_LEVEL_KEY, 0x07][..]), at(5000));
        assert!(evt.decoded().is_malformed());
        assert!(!evt.has_output());

        rx.process(&Frame::from(&[0x77u8][..]), at(5000));
        rx.process(&Frame::from(&[0x1au8, 0x01][..]), at(5000));

        // a level still goes through after all that
        let evt = rx.process(&level_frame(0x05, 0x00), at(5000));
        assert!(evt.fine().is_some());

        let stats = rx.stats();
        assert_eq!(5, stats.frames);
        assert_eq!(1, stats.empty);
        assert_eq!(1, stats.malformed);
        assert_eq!(1, stats.unknown);
        assert_eq!(1, stats.recognized);
        assert_eq!(1, stats.measurements);
    }

    #[test]
    fn test_violation_on_fine_samples() {
        let mut rx = SlmReceiverBuilder::default().build_at(0);
        let levels = [(0x07, 0x00), (0x09, 0x50), (0x08, 0x00), (0x09, 0x60)];

        let mut last = None;
        for (i, (hi, lo)) in levels.into_iter().enumerate() {
            // discarded measurements never reach the detector
            rx.process(&level_frame(0x99, 0x90), at(i as u64 * 1000 + 500));
            last = Some(rx.process(&level_frame(hi, lo), at((i as u64 + 1) * 1000)));
        }

        let evt = last.expect("expected event");
        let violation = evt.violation().expect("expected violation");
        assert_approx_eq!(87.5f64, violation.median_db);
        assert_eq!(at(4000).wall, violation.at);
        assert_eq!(4, rx.detector().buffer().len());
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut rx = SlmReceiverBuilder::default().build_at(0);
        assert!(rx.input(NOISE_LEVEL_KEY, at(900)).is_none());
        assert!(rx.input(0x07, at(900)).is_none());
        rx.reset();
        assert_eq!(2, rx.stats().discarded_bytes);

        // the stale key is gone, so this is a two-byte unknown frame
        rx.input(0x24, at(1000));
        rx.input(0x00, at(1000));
        let evt = rx.input(SENTINEL, at(1000)).expect("expected event");
        assert!(matches!(evt.decoded(), DecodeResult::UnknownKey(0x24, _)));

        // windows keep their phase across a reset
        assert_eq!(1000, rx.scheduler().fine().next_due_ms());
    }

    #[test]
    fn test_iter() {
        const DATA: &[u8] = &[
            SENTINEL, 0x0d, 0x07, 0x24, SENTINEL, SENTINEL, 0x0d, 0x08, 0x00, SENTINEL, 0x0d,
        ];

        let clock = StepClock::new(100);
        let mut rx = SlmReceiverBuilder::default()
            .with_fine_period_ms(100)
            .build_at(0);
        let evts: Vec<ReceiverEvent> = rx.iter(DATA.iter().copied(), &clock).collect();
        assert_eq!(4, evts.len());
        assert_eq!(&DecodeResult::Empty, evts[0].decoded());
        assert_eq!(Some(Decibels::from_tenths(724)), evts[1].decoded().level());
        assert_eq!(&DecodeResult::Empty, evts[2].decoded());
        assert_eq!(Some(Decibels::from_tenths(800)), evts[3].decoded().level());
        assert_eq!(400, evts[3].arrival().mono_ms);
        assert!(evts[3].fine().is_some());
        assert_eq!(
            "[400       ]: noise level: 80.0 dB [fine]",
            evts[3].to_string()
        );
    }
}
