//! # slmframe: Sound Level Meter Serial Decoding
//!
//! This crate decodes the serial output of a handheld digital sound
//! level meter. It turns the meter's raw byte stream into sound level
//! measurements, keeps a fine-resolution and a compliance-resolution
//! series of them, and flags noise limit violations.
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! This crate has not been certified for regulatory noise monitoring or
//! for any other purpose. The wire format was learned by observing one
//! meter, and your meter may say things we have never seen.
//!
//! ## Example
//!
//! The meter talks over a serial port at 9600 baud, 8N1. Opening the
//! port is beyond the scope of this crate; try
//! [serialport](https://crates.io/crates/serialport).
//!
//! ```
//! use slmframe::{SlmReceiverBuilder, SystemClock};
//!
//! # let some_serial_byte_iterator = || [0x0du8, 0x07, 0x24, 0xa5].into_iter();
//! #
//! // keep one level per second, one per minute for compliance,
//! // and complain about anything louder than 85 dB
//! let mut rx = SlmReceiverBuilder::new()
//!     .with_fine_period_ms(1000)
//!     .with_compliance_period_ms(60_000)
//!     .with_threshold_db(85.0)
//!     .build();
//!
//! let clock = SystemClock::new();
//! for evt in rx.iter(some_serial_byte_iterator(), &clock) {
//!     if let Some(sample) = evt.fine() {
//!         println!("{}", sample.measurement);
//!     }
//!     if let Some(violation) = evt.violation() {
//!         println!("{}", violation);
//!     }
//! }
//! ```
//!
//! The [`SlmReceiver`] binds by iterator to any source of bytes and
//! produces one [`ReceiverEvent`] per frame. Long-running programs
//! which must survive a meter being unplugged should instead read from
//! a [`ByteSource`], feed each byte to [`SlmReceiver::input()`], and
//! call [`SlmReceiver::reset()`] whenever the source is reconnected.
//!
//! ## Wire format
//!
//! Frames are terminated by the [`SENTINEL`] byte `0xa5`. The first
//! byte of a frame is its *key*. The sound level frame has key
//! [`NOISE_LEVEL_KEY`] `0x0d`, followed by a two-byte packed BCD
//! level. The four digits are hundreds, tens, units, and tenths of
//! a dB.
//!
//! ```txt
//! 0d 07 24 a5   =>   72.4 dB
//! ```
//!
//! The meter sends many other frames, such as range and weighting
//! changes. These are reported as [`DecodeResult::Recognized`] or
//! [`DecodeResult::UnknownKey`] and otherwise ignored.

mod builder;
mod deframer;
mod frame;
mod keys;
mod level;
mod receiver;
mod retry;
mod sink;
mod source;
mod violation;
mod window;

pub use builder::SlmReceiverBuilder;
pub use deframer::{Deframer, FrameIter};
pub use frame::{DecodeResult, Frame, Measurement, MAX_FRAME_LENGTH, NOISE_LEVEL_KEY, SENTINEL};
pub use keys::FrameKey;
pub use level::Decibels;
pub use receiver::{ReceiverEvent, ReceiverStats, Sample, Series, SlmReceiver, SourceIter};
pub use retry::{Delay, RetryError, RetryPolicy, ThreadDelay};
pub use sink::{
    series_name, CsvAppendSink, NotificationSink, Point, SinkError, TimeSeriesSink,
};
pub use source::{read_one, Arrival, ByteSource, Clock, SourceError, SystemClock};
pub use violation::{RollingSampleBuffer, Violation, ViolationDetector, ROLLING_SAMPLES};
pub use window::{SampleScheduler, SamplingWindow, Schedule};
