//! Frame key bytes

use std::fmt;

use phf::phf_map;
use strum::EnumMessage;

/// Known frame keys
///
/// The first byte of every frame selects what the rest of the frame
/// means. Only [`FrameKey::NoiseLevel`] is decoded. The remaining
/// keys have been observed on the wire and are reported for
/// diagnostics: some have a known meaning, like the FAST/SLOW time
/// weighting, and some are only known to exist.
///
/// ```
/// use slmframe::FrameKey;
///
/// let key = FrameKey::lookup(0x02).expect("known key");
/// assert_eq!(FrameKey::SpeedFast, key);
/// assert_eq!(0x02, key.as_byte());
/// assert_eq!("Speed: FAST", key.as_display_str());
///
/// assert_eq!(None, FrameKey::lookup(0x7f));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage)]
#[repr(u8)]
pub enum FrameKey {
    /// Sound level, packed BCD
    #[strum(detailed_message = "Noise level")]
    NoiseLevel = 0x0d,

    /// FAST time weighting selected
    #[strum(detailed_message = "Speed: FAST")]
    SpeedFast = 0x02,

    /// SLOW time weighting selected
    #[strum(detailed_message = "Speed: SLOW")]
    SpeedSlow = 0x03,

    /// Measurement range 50–100 dB
    #[strum(detailed_message = "Range: 50 - 100")]
    Range50To100 = 0x4b,

    /// Measurement range 80–130 dB
    #[strum(detailed_message = "Range: 80 - 130")]
    Range80To130 = 0x4c,

    /// Measurement range 30–130 dB
    #[strum(detailed_message = "Range: 30 - 130")]
    Range30To130 = 0x40,

    /// Measurement range 30–80 dB
    #[strum(detailed_message = "Range: 30 - 80")]
    Range30To80 = 0x30,

    /// MAX hold active
    #[strum(detailed_message = "MIN/MAX: MAX")]
    MaxHold = 0x04,

    /// MIN hold active
    #[strum(detailed_message = "MIN/MAX: MIN")]
    MinHold = 0x05,

    /// Internal recording started
    #[strum(detailed_message = "Record: ON")]
    RecordOn = 0x0a,

    /// Internal recording stopped
    #[strum(detailed_message = "Record: OFF")]
    RecordOff = 0x1a,

    #[strum(detailed_message = "Undocumented 0x06")]
    Undocumented06 = 0x06,

    #[strum(detailed_message = "Undocumented 0x08")]
    Undocumented08 = 0x08,

    #[strum(detailed_message = "Undocumented 0x0b")]
    Undocumented0B = 0x0b,

    #[strum(detailed_message = "Undocumented 0x0c")]
    Undocumented0C = 0x0c,

    #[strum(detailed_message = "Undocumented 0x0e")]
    Undocumented0E = 0x0e,

    #[strum(detailed_message = "Undocumented 0x11")]
    Undocumented11 = 0x11,

    #[strum(detailed_message = "Undocumented 0x19")]
    Undocumented19 = 0x19,

    #[strum(detailed_message = "Undocumented 0x1b")]
    Undocumented1B = 0x1b,

    #[strum(detailed_message = "Undocumented 0x1f")]
    Undocumented1F = 0x1f,
}

impl FrameKey {
    /// Find the key for a frame's leading byte
    ///
    /// Returns `None` if the byte has never been observed as a key.
    pub fn lookup(byte: u8) -> Option<FrameKey> {
        KEYBOOK.get(&byte).copied()
    }

    /// The key's byte value on the wire
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Human-readable description, like "`Speed: FAST`"
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }

    /// True if the key carries a meaning beyond "seen on the wire"
    pub fn is_documented(&self) -> bool {
        !self.as_display_str().starts_with("Undocumented")
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_display_str().fmt(f)
    }
}

static KEYBOOK: phf::Map<u8, FrameKey> = phf_map! {
    0x0du8 => FrameKey::NoiseLevel,
    0x02u8 => FrameKey::SpeedFast,
    0x03u8 => FrameKey::SpeedSlow,
    0x4bu8 => FrameKey::Range50To100,
    0x4cu8 => FrameKey::Range80To130,
    0x40u8 => FrameKey::Range30To130,
    0x30u8 => FrameKey::Range30To80,
    0x04u8 => FrameKey::MaxHold,
    0x05u8 => FrameKey::MinHold,
    0x0au8 => FrameKey::RecordOn,
    0x1au8 => FrameKey::RecordOff,
    0x06u8 => FrameKey::Undocumented06,
    0x08u8 => FrameKey::Undocumented08,
    0x0bu8 => FrameKey::Undocumented0B,
    0x0cu8 => FrameKey::Undocumented0C,
    0x0eu8 => FrameKey::Undocumented0E,
    0x11u8 => FrameKey::Undocumented11,
    0x19u8 => FrameKey::Undocumented19,
    0x1bu8 => FrameKey::Undocumented1B,
    0x1fu8 => FrameKey::Undocumented1F,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keybook_matches_discriminants() {
        for (byte, key) in KEYBOOK.entries() {
            assert_eq!(*byte, key.as_byte(), "{:?}", key);
        }
        assert_eq!(20, KEYBOOK.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Some(FrameKey::NoiseLevel), FrameKey::lookup(0x0d));
        assert_eq!(Some(FrameKey::Range80To130), FrameKey::lookup(0x4c));
        assert_eq!(Some(FrameKey::Undocumented1F), FrameKey::lookup(0x1f));
        assert_eq!(None, FrameKey::lookup(0x00));
        assert_eq!(None, FrameKey::lookup(0xa5));
    }

    #[test]
    fn test_display() {
        assert_eq!("Record: OFF", FrameKey::RecordOff.to_string());
        assert!(FrameKey::RecordOff.is_documented());
        assert!(!FrameKey::Undocumented0E.is_documented());
    }
}
