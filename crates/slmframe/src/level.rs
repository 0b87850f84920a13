//! Sound level values

use std::fmt;

/// A sound level, in tenths of a decibel
///
/// The meter reports levels as four packed-BCD digits with one
/// digit after the decimal point. `Decibels` keeps the value as an
/// integer count of tenths so that it is never subject to
/// floating-point rounding until a caller asks for it.
///
/// ```
/// use slmframe::Decibels;
///
/// let lvl = Decibels::from_bcd(0x15, 0x23);
/// assert_eq!(1523, lvl.tenths());
/// assert_eq!("152.3", lvl.to_string());
/// ```
///
/// The digits are not range-checked. A nibble greater than nine
/// still contributes its face value to the result, which can
/// produce levels above `999.9`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decibels(u16);

impl Decibels {
    /// From a count of tenths of a dB
    pub const fn from_tenths(tenths: u16) -> Self {
        Self(tenths)
    }

    /// Decode two packed-BCD bytes
    ///
    /// `hi` carries the hundreds and tens digits, and `lo` carries
    /// the ones and tenths digits, each as (high nibble, low nibble).
    pub fn from_bcd(hi: u8, lo: u8) -> Self {
        let hundreds = high_nibble(hi) as u16;
        let tens = low_nibble(hi) as u16;
        let ones = high_nibble(lo) as u16;
        let tenths = low_nibble(lo) as u16;
        Self(hundreds * 1000 + tens * 100 + ones * 10 + tenths)
    }

    /// Level in tenths of a dB
    pub fn tenths(&self) -> u16 {
        self.0
    }

    /// Level in dB
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl From<Decibels> for f64 {
    fn from(lvl: Decibels) -> f64 {
        lvl.as_f64()
    }
}

impl fmt::Display for Decibels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

#[inline]
fn high_nibble(byte: u8) -> u8 {
    (byte & 0xf0) >> 4
}

#[inline]
fn low_nibble(byte: u8) -> u8 {
    byte & 0x0f
}
