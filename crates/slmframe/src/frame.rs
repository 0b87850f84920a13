//! Frames and frame decoding

use std::fmt;

use chrono::{DateTime, Utc};

use crate::keys::FrameKey;
use crate::level::Decibels;

/// Frame delimiter
///
/// Every frame on the wire is terminated by this byte. It is never
/// escaped, and it is never part of a frame.
pub const SENTINEL: u8 = 0xa5;

/// Key byte of the noise level frame
pub const NOISE_LEVEL_KEY: u8 = FrameKey::NoiseLevel as u8;

/// Maximum frame length, in bytes
///
/// Real frames are only a few bytes long. Anything longer than this
/// is line noise or a missing delimiter, and the excess is dropped.
pub const MAX_FRAME_LENGTH: usize = 256;

/// Minimum noise level payload, in bytes (after the key)
const NOISE_LEVEL_PAYLOAD_LEN: usize = 2;

/// One delimited frame
///
/// A `Frame` contains every byte received between two
/// [`SENTINEL`] bytes. The first byte is the frame's
/// [`key()`](Frame::key), and the rest are its
/// [`payload()`](Frame::payload). A `Frame` may be empty: this
/// happens when two sentinels arrive back-to-back, and it means
/// the meter had nothing to say this cycle.
///
/// ```
/// use slmframe::{DecodeResult, Frame};
///
/// let frame = Frame::from(&[0x0du8, 0x07, 0x24][..]);
/// match frame.decode() {
///     DecodeResult::NoiseLevel(lvl) => assert_eq!("72.4", lvl.to_string()),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    data: Vec<u8>,
    truncated: usize,
}

impl Frame {
    pub(crate) fn new(data: Vec<u8>, truncated: usize) -> Self {
        Self { data, truncated }
    }

    /// Key byte, or `None` for an empty frame
    pub fn key(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Everything after the key byte
    pub fn payload(&self) -> &[u8] {
        self.data.get(1..).unwrap_or_default()
    }

    /// True if no bytes were received between sentinels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Frame length, in bytes, including the key
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Count of bytes dropped because the frame was too long
    pub fn truncated(&self) -> usize {
        self.truncated
    }

    /// Frame bytes as lowercase hex, key included
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }

    /// Interpret the frame
    ///
    /// Decoding is pure: it does not depend on any earlier frame.
    /// See [`DecodeResult`] for the possible outcomes.
    pub fn decode(&self) -> DecodeResult {
        let key = match self.key() {
            Some(key) => key,
            None => return DecodeResult::Empty,
        };

        match FrameKey::lookup(key) {
            Some(FrameKey::NoiseLevel) => {
                let payload = self.payload();
                if payload.len() < NOISE_LEVEL_PAYLOAD_LEN {
                    DecodeResult::TooShort(key)
                } else {
                    DecodeResult::NoiseLevel(Decibels::from_bcd(payload[0], payload[1]))
                }
            }
            Some(known) => DecodeResult::Recognized(known, self.to_hex()),
            None => DecodeResult::UnknownKey(key, self.to_hex()),
        }
    }
}

impl From<&[u8]> for Frame {
    fn from(data: &[u8]) -> Self {
        let keep = usize::min(data.len(), MAX_FRAME_LENGTH);
        Self::new(data[..keep].to_vec(), data.len() - keep)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Outcome of decoding one [`Frame`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecodeResult {
    /// The frame was empty
    ///
    /// Two sentinels arrived back-to-back. This is not an error.
    Empty,

    /// A sound level was decoded
    NoiseLevel(Decibels),

    /// A known key which is not decoded
    ///
    /// Includes the frame as hex, for diagnostics.
    Recognized(FrameKey, String),

    /// A key we have never seen before
    ///
    /// Includes the key byte and the frame as hex.
    UnknownKey(u8, String),

    /// A noise level frame without enough payload
    ///
    /// The noise level key was received, but fewer than two payload
    /// bytes followed it.
    TooShort(u8),
}

impl DecodeResult {
    /// Decoded sound level, if any
    pub fn level(&self) -> Option<Decibels> {
        match self {
            DecodeResult::NoiseLevel(lvl) => Some(*lvl),
            _ => None,
        }
    }

    /// True for frames which carried something we could not use
    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeResult::TooShort(_))
    }

    /// Stamp a decoded level with its arrival time
    ///
    /// Returns `None` unless this result is a
    /// [`NoiseLevel`](DecodeResult::NoiseLevel).
    pub fn into_measurement(self, arrival_time: DateTime<Utc>) -> Option<Measurement> {
        self.level().map(|level| Measurement {
            level,
            arrival_time,
        })
    }
}

impl AsRef<str> for DecodeResult {
    fn as_ref(&self) -> &str {
        match self {
            DecodeResult::Empty => "empty",
            DecodeResult::NoiseLevel(_) => "noise level",
            DecodeResult::Recognized(_, _) => "recognized",
            DecodeResult::UnknownKey(_, _) => "unknown frame",
            DecodeResult::TooShort(_) => "too short",
        }
    }
}

impl fmt::Display for DecodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeResult::NoiseLevel(lvl) => write!(f, "{}: {} dB", self.as_ref(), lvl),
            DecodeResult::Recognized(key, hex) => {
                write!(f, "{}: {} ({})", self.as_ref(), key, hex)
            }
            DecodeResult::UnknownKey(key, hex) => {
                write!(f, "{}: key 0x{:02x} ({})", self.as_ref(), key, hex)
            }
            DecodeResult::TooShort(key) => write!(f, "{}: key 0x{:02x}", self.as_ref(), key),
            DecodeResult::Empty => write!(f, "{}", self.as_ref()),
        }
    }
}

/// A sound level and the time it arrived
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Measurement {
    /// Decoded level
    pub level: Decibels,

    /// Wall-clock time at which the frame was completed
    pub arrival_time: DateTime<Utc>,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {} dB", self.arrival_time.to_rfc3339(), self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    #[test]
    fn test_decode_noise_level() {
        let frame = Frame::from(&[NOISE_LEVEL_KEY, 0x15, 0x23][..]);
        assert_eq!(
            DecodeResult::NoiseLevel(Decibels::from_tenths(1523)),
            frame.decode()
        );

        // extra payload is ignored
        let frame = Frame::from(&[NOISE_LEVEL_KEY, 0x06, 0x51, 0x99, 0x01][..]);
        assert_eq!(Some(Decibels::from_tenths(651)), frame.decode().level());
    }

    #[test]
    fn test_decode_too_short() {
        let frame = Frame::from(&[NOISE_LEVEL_KEY, 0x15][..]);
        assert_eq!(DecodeResult::TooShort(NOISE_LEVEL_KEY), frame.decode());
        assert!(frame.decode().is_malformed());

        let frame = Frame::from(&[NOISE_LEVEL_KEY][..]);
        assert_eq!(DecodeResult::TooShort(NOISE_LEVEL_KEY), frame.decode());
    }

    #[test]
    fn test_decode_other_keys() {
        let frame = Frame::from(&[0x02u8, 0x00][..]);
        assert_eq!(
            DecodeResult::Recognized(FrameKey::SpeedFast, "0200".to_owned()),
            frame.decode()
        );

        let frame = Frame::from(&[0x77u8, 0xde, 0xad][..]);
        assert_eq!(
            DecodeResult::UnknownKey(0x77, "77dead".to_owned()),
            frame.decode()
        );
        assert_eq!(None, frame.decode().level());
    }

    #[test]
    fn test_decode_empty() {
        let frame = Frame::default();
        assert!(frame.is_empty());
        assert_eq!(None, frame.key());
        assert_eq!(&[] as &[u8], frame.payload());
        assert_eq!(DecodeResult::Empty, frame.decode());
        assert!(!frame.decode().is_malformed());
    }

    #[test]
    fn test_from_slice_truncates() {
        let long = vec![0x11u8; MAX_FRAME_LENGTH + 10];
        let frame = Frame::from(long.as_slice());
        assert_eq!(MAX_FRAME_LENGTH, frame.len());
        assert_eq!(10, frame.truncated());
    }

    #[test]
    fn test_into_measurement() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let meas = DecodeResult::NoiseLevel(Decibels::from_tenths(724))
            .into_measurement(at)
            .expect("expected measurement");
        assert_eq!(meas.arrival_time, at);
        assert_eq!(meas.level.to_string(), "72.4");

        assert!(DecodeResult::TooShort(NOISE_LEVEL_KEY)
            .into_measurement(at)
            .is_none());
    }

    #[test]
    fn test_display() {
        let frame = Frame::from(&[0x1au8, 0x01][..]);
        assert_eq!("recognized: Record: OFF (1a01)", frame.decode().to_string());
        assert_eq!(
            "too short: key 0x0d",
            DecodeResult::TooShort(0x0d).to_string()
        );
    }
}
