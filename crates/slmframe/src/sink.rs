//! Output sinks
//!
//! The receiver decides *what* gets recorded. Writing it somewhere is
//! left to implementations of these traits. Sink failures are the
//! sink's problem: callers log them and move on, and nothing is
//! queued or retried on the sink's behalf.

use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::receiver::{Sample, Series};

/// Error writing to a sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote end could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote end refused the write
    #[error("rejected with status {status}: {reason}")]
    Rejected {
        /// Status code, like an HTTP status
        status: u16,

        /// Explanation from the remote end
        reason: String,
    },
}

/// One point for a time-series database
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    /// Series (measurement) name
    pub series: String,

    /// `location` tag
    pub location: String,

    /// `dB` field
    pub db: f64,

    /// Point time, written at nanosecond precision
    pub timestamp: DateTime<Utc>,
}

impl Point {
    /// Point for a sample, using `primary` as the base series name
    ///
    /// See [`series_name()`].
    pub fn from_sample(primary: &str, location: &str, sample: &Sample) -> Self {
        Self {
            series: series_name(primary, sample.series),
            location: location.to_owned(),
            db: sample.measurement.level.as_f64(),
            timestamp: sample.measurement.arrival_time,
        }
    }
}

/// Name of the time series for `series`
///
/// Fine samples are written to the `primary` series. Compliance
/// samples are written to a second series with a `-compliance`
/// suffix.
///
/// ```
/// use slmframe::{series_name, Series};
///
/// assert_eq!("noise", series_name("noise", Series::Fine));
/// assert_eq!("noise-compliance", series_name("noise", Series::Compliance));
/// ```
pub fn series_name(primary: &str, series: Series) -> String {
    match series {
        Series::Fine => primary.to_owned(),
        Series::Compliance => format!("{}-compliance", primary),
    }
}

/// Time-series database writer
pub trait TimeSeriesSink {
    /// Write one point
    fn write(&mut self, point: &Point) -> Result<(), SinkError>;
}

/// Push notification channel
pub trait NotificationSink {
    /// Send a human-readable message
    fn notify(&mut self, message: &str) -> Result<(), SinkError>;
}

/// Per-day CSV log
pub trait CsvAppendSink {
    /// Append one sample to the log for its series and day
    fn append(&mut self, sample: &Sample) -> Result<(), SinkError>;
}
