//! Sentinel-delimited framing

use arrayvec::ArrayVec;

#[cfg(not(test))]
use log::{debug, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

use crate::frame::{Frame, MAX_FRAME_LENGTH, SENTINEL};

/// Sound level meter deframer
///
/// The `Deframer` accepts one byte at a time with
/// [`input()`](#method.input). Bytes are accumulated until the
/// [`SENTINEL`](crate::SENTINEL) is received. The accumulated bytes
/// are then emitted as a [`Frame`], and accumulation starts over.
/// The sentinel itself is never part of a frame.
///
/// Two sentinels in a row produce an *empty* frame. Empty frames
/// are emitted like any other frame so that callers can tell
/// "nothing this cycle" apart from "nothing at all."
///
/// There is no escaping. The meter never sends the sentinel value
/// inside a frame, and if it ever does, that byte still ends the
/// frame.
///
/// Frames longer than [`MAX_FRAME_LENGTH`](crate::MAX_FRAME_LENGTH)
/// are truncated. The excess bytes are counted and reported by
/// [`Frame::truncated()`].
///
/// ```
/// use slmframe::Deframer;
///
/// let mut deframer = Deframer::new();
/// let frames: Vec<_> = deframer
///     .iter([0x0d, 0x07, 0x24, 0xa5, 0xa5, 0x02].into_iter())
///     .collect();
/// assert_eq!(2, frames.len());
/// assert_eq!(&[0x0du8, 0x07, 0x24][..], frames[0].as_ref());
/// assert!(frames[1].is_empty());
///
/// // 0x02 is still waiting for its sentinel
/// assert_eq!(1, deframer.pending_len());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Deframer {
    // bytes received since the last sentinel
    buf: FrameBuf,

    // bytes dropped from the current frame because it is full
    overflow: usize,
}

impl Deframer {
    /// New deframer, waiting for its first byte
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle received byte
    ///
    /// Returns a completed [`Frame`] if `data` is the sentinel.
    /// Otherwise, the byte is buffered and `None` is returned.
    pub fn input(&mut self, data: u8) -> Option<Frame> {
        if data == SENTINEL {
            let frame = Frame::new(self.buf.to_vec(), self.overflow);
            if self.overflow > 0 {
                warn!(
                    "deframer: frame exceeded {} bytes; dropped {} bytes",
                    MAX_FRAME_LENGTH, self.overflow
                );
            }
            self.buf.clear();
            self.overflow = 0;
            Some(frame)
        } else {
            if self.buf.try_push(data).is_err() {
                self.overflow += 1;
            }
            None
        }
    }

    /// Discard any partially-received frame
    ///
    /// Call this whenever the byte stream is interrupted, such as when
    /// the serial device is reconnected. A frame which spans the
    /// interruption is never stitched together with bytes from after
    /// it. Returns the number of bytes discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.pending_len();
        if discarded > 0 {
            debug!("deframer: reset: discarding {} partial bytes", discarded);
        }
        self.buf.clear();
        self.overflow = 0;
        discarded
    }

    /// Count of bytes waiting for a sentinel
    pub fn pending_len(&self) -> usize {
        self.buf.len() + self.overflow
    }

    /// Frames from a source of bytes
    ///
    /// Binds an iterator which consumes as many bytes of `input`
    /// as needed to produce the next [`Frame`]. It returns `None`
    /// when the input is exhausted; any partial frame stays buffered
    /// for the next call.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter<'d, I>(&'d mut self, input: I) -> FrameIter<'d, I>
    where
        I: Iterator<Item = u8>,
    {
        FrameIter {
            source: input,
            deframer: self,
        }
    }
}

/// Frame iterator
///
/// See [`Deframer::iter()`].
#[derive(Debug)]
pub struct FrameIter<'d, I>
where
    I: Iterator<Item = u8>,
{
    source: I,
    deframer: &'d mut Deframer,
}

impl<'d, I> Iterator for FrameIter<'d, I>
where
    I: Iterator<Item = u8>,
{
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        for byte in &mut self.source {
            if let Some(frame) = self.deframer.input(byte) {
                return Some(frame);
            }
        }
        None
    }
}

// Bytes of the frame under construction
type FrameBuf = ArrayVec<u8, MAX_FRAME_LENGTH>;

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_three_frames() {
        const DATA: &[u8] = &[0x0d, 0x07, 0x24, SENTINEL, SENTINEL, 0x02, SENTINEL];

        let mut deframer = Deframer::new();
        let frames: Vec<Frame> = deframer.iter(DATA.iter().copied()).collect();
        assert_eq!(3, frames.len());
        assert_eq!(&[0x0du8, 0x07, 0x24][..], frames[0].as_ref());
        assert!(frames[1].is_empty());
        assert_eq!(&[0x02u8][..], frames[2].as_ref());
        assert_eq!(0, deframer.pending_len());
    }

    #[test]
    fn test_restartable() {
        let mut deframer = Deframer::new();
        assert_eq!(0, deframer.iter([0x0d, 0x07].into_iter()).count());
        assert_eq!(2, deframer.pending_len());

        // the partial frame carries across calls
        let frames: Vec<Frame> = deframer.iter([0x24, SENTINEL].into_iter()).collect();
        assert_eq!(1, frames.len());
        assert_eq!(&[0x0du8, 0x07, 0x24][..], frames[0].as_ref());
    }

    #[test]
    fn test_reset_discards_partial() {
        let mut deframer = Deframer::new();
        assert!(deframer.input(0x0d).is_none());
        assert!(deframer.input(0x07).is_none());
        assert_eq!(2, deframer.reset());

        // never stitched onto post-reset bytes
        assert!(deframer.input(0x02).is_none());
        let frame = deframer.input(SENTINEL).expect("expected frame");
        assert_eq!(&[0x02u8][..], frame.as_ref());
        assert_eq!(0, deframer.reset());
    }

    #[test]
    fn test_overflow() {
        let mut deframer = Deframer::new();
        for _i in 0..MAX_FRAME_LENGTH + 3 {
            assert!(deframer.input(0x11).is_none());
        }
        assert_eq!(MAX_FRAME_LENGTH + 3, deframer.pending_len());

        let frame = deframer.input(SENTINEL).expect("expected frame");
        assert_eq!(MAX_FRAME_LENGTH, frame.len());
        assert_eq!(3, frame.truncated());

        // next frame starts clean
        let frame = deframer.input(SENTINEL).expect("expected frame");
        assert!(frame.is_empty());
        assert_eq!(0, frame.truncated());
    }

    fn non_sentinel_bytes(max: usize) -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>().prop_filter("sentinel", |b| *b != SENTINEL), 0..max)
    }

    proptest! {
        #[test]
        fn no_sentinel_no_frames(data in non_sentinel_bytes(512)) {
            let mut deframer = Deframer::new();
            prop_assert_eq!(0, deframer.iter(data.into_iter()).count());
        }

        #[test]
        fn delimited_frames_come_back_in_order(
            b1 in non_sentinel_bytes(16),
            b2 in non_sentinel_bytes(16),
            b3 in non_sentinel_bytes(16),
        ) {
            let mut stream = vec![];
            for part in [&b1, &b2, &b3] {
                stream.extend_from_slice(part);
                stream.push(SENTINEL);
            }

            let mut deframer = Deframer::new();
            let frames: Vec<Frame> = deframer.iter(stream.into_iter()).collect();
            prop_assert_eq!(3, frames.len());
            prop_assert_eq!(b1.as_slice(), frames[0].as_ref());
            prop_assert_eq!(b2.as_slice(), frames[1].as_ref());
            prop_assert_eq!(b3.as_slice(), frames[2].as_ref());
        }
    }
}
