//! Byte sources: the meter's serial port, or a capture file

use std::io;
use std::time::Duration;

use log::{debug, info};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use slmframe::{read_one, ByteSource, SourceError};

/// The meter, on a serial port
///
/// The port is opened 8N1 without flow control. A failed port is
/// dropped, and [`reconnect()`](ByteSource::reconnect) opens it
/// again from scratch.
pub struct SerialSource {
    device: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialSource {
    /// Open `device` at `baud_rate`
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, SourceError> {
        let mut out = Self {
            device: device.to_owned(),
            baud_rate,
            port: None,
        };
        out.reconnect()?;
        Ok(out)
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SourceError> {
        self.port
            .as_mut()
            .ok_or_else(|| SourceError::Disconnected(format!("{} is not open", self.device)))
    }
}

impl ByteSource for SerialSource {
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, SourceError> {
        let port = self.port_mut()?;
        if port.timeout() != timeout {
            port.set_timeout(timeout).map_err(serial_error)?;
        }

        match read_one(port.as_mut()) {
            Ok(byte) => Ok(byte),
            Err(SourceError::Exhausted) => {
                // a serial port never ends; a zero-length read means it went away
                self.port = None;
                Err(SourceError::Disconnected(format!(
                    "{}: device closed",
                    self.device
                )))
            }
            Err(e) => {
                self.port = None;
                Err(e)
            }
        }
    }

    fn reconnect(&mut self) -> Result<(), SourceError> {
        self.port = None;
        debug!("opening {} at {} baud", self.device, self.baud_rate);
        let port = serialport::new(&self.device, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(serial_error)?;
        info!("connected to {}", self.device);
        self.port = Some(port);
        Ok(())
    }
}

fn serial_error(err: serialport::Error) -> SourceError {
    match err.kind() {
        serialport::ErrorKind::Io(kind) => SourceError::Io(io::Error::new(kind, err)),
        _ => SourceError::Disconnected(err.to_string()),
    }
}

/// A captured byte stream, replayed once
///
/// The end of the stream ends the run. There is nothing to
/// reconnect to.
pub struct ReplaySource<R> {
    reader: R,
}

impl<R> ReplaySource<R>
where
    R: io::Read,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> ByteSource for ReplaySource<R>
where
    R: io::Read,
{
    fn read_byte(&mut self, _timeout: Duration) -> Result<Option<u8>, SourceError> {
        read_one(&mut self.reader)
    }

    fn reconnect(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Exhausted)
    }
}
