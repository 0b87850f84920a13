//! Byte sources and clocks

use std::io::{self, Read};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A source of bytes from the meter
///
/// Usually a serial port. The receiver pulls one byte at a time;
/// a source which has nothing to offer within the timeout returns
/// `Ok(None)`, which is not an error.
pub trait ByteSource {
    /// Read one byte, waiting at most `timeout`
    ///
    /// * `Ok(Some(byte))`: a byte was received
    /// * `Ok(None)`: nothing arrived before the timeout
    /// * `Err(_)`: the source has failed and must be
    ///   [reconnected](ByteSource::reconnect)
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SourceError>;

    /// Try to restore a failed source
    fn reconnect(&mut self) -> Result<(), SourceError>;
}

/// Error reading from a [`ByteSource`]
#[derive(Error, Debug)]
pub enum SourceError {
    /// The device went away
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A finite source (like a capture file) has no more bytes
    ///
    /// Exhausted sources cannot be reconnected.
    #[error("end of input")]
    Exhausted,
}

impl SourceError {
    /// True if the source has ended for good
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SourceError::Exhausted)
    }
}

/// Read one byte from any reader
///
/// Maps read timeouts to `Ok(None)` and end-of-file to
/// [`SourceError::Exhausted`]. Interrupted reads are retried.
pub fn read_one<R>(reader: &mut R) -> Result<Option<u8>, SourceError>
where
    R: Read + ?Sized,
{
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Err(SourceError::Exhausted),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Arrival instant of a frame
///
/// Pairs wall-clock time, which is what gets logged, with a
/// monotonic millisecond count, which is what the sampling windows
/// run on. The monotonic count starts at zero when the [`Clock`]
/// is created and is unaffected by wall-clock adjustments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Arrival {
    /// Wall-clock time
    pub wall: DateTime<Utc>,

    /// Monotonic milliseconds since the clock's epoch
    pub mono_ms: u64,
}

/// Source of [`Arrival`] times
pub trait Clock {
    /// The current time
    fn now(&self) -> Arrival;
}

/// Operating system clock
///
/// The monotonic epoch is the moment this clock was created.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// New clock with its epoch at the present instant
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Arrival {
        Arrival {
            wall: Utc::now(),
            mono_ms: self.epoch.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // yields a fixed script of read outcomes
    struct ScriptedReader(Vec<io::Result<u8>>);

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            match self.0.remove(0) {
                Ok(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn test_read_one() {
        let mut rdr = ScriptedReader(vec![
            Ok(0x0d),
            Err(io::ErrorKind::TimedOut.into()),
            Err(io::ErrorKind::Interrupted.into()),
            Ok(0xa5),
            Err(io::ErrorKind::BrokenPipe.into()),
        ]);

        assert_eq!(Some(0x0d), read_one(&mut rdr).unwrap());
        assert_eq!(None, read_one(&mut rdr).unwrap());
        assert_eq!(Some(0xa5), read_one(&mut rdr).unwrap());
        assert!(matches!(read_one(&mut rdr), Err(SourceError::Io(_))));
        assert!(read_one(&mut rdr).unwrap_err().is_exhausted());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second.mono_ms >= first.mono_ms);
        assert!(first.mono_ms < 60_000);
    }
}
