//! Daily CSV logs

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use slmframe::{CsvAppendSink, Sample, Series, SinkError};

/// Appends samples to one CSV file per day and series
///
/// Fine samples go to `<dir>/<YYYY-MM-DD>-noise.csv` and compliance
/// samples to `<dir>/<YYYY-MM-DD>-noise-compliance.csv`. The date,
/// and each row's timestamp, are in the configured timezone. Rows
/// have no header:
///
/// ```txt
/// 2024-05-02T08:00:00.256,72.4
/// ```
pub struct DailyCsvSink {
    dir: PathBuf,
    tz: Tz,
}

impl DailyCsvSink {
    pub fn new<P: AsRef<Path>>(dir: P, tz: Tz) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
            tz,
        }
    }

    /// Log file for the given series on the day of `at`
    pub fn path_for(&self, series: Series, at: &DateTime<Utc>) -> PathBuf {
        let suffix = match series {
            Series::Fine => "noise",
            Series::Compliance => "noise-compliance",
        };
        let day = at.with_timezone(&self.tz).format("%Y-%m-%d");
        self.dir.join(format!("{}-{}.csv", day, suffix))
    }
}

impl CsvAppendSink for DailyCsvSink {
    fn append(&mut self, sample: &Sample) -> Result<(), SinkError> {
        let at = &sample.measurement.arrival_time;
        let path = self.path_for(sample.series, at);

        fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        wtr.write_record([
            csv_timestamp(at, &self.tz),
            sample.measurement.level.to_string(),
        ])
        .map_err(csv_error)?;
        wtr.flush()?;
        Ok(())
    }
}

/// Timestamp with milliseconds, in `tz`, without an offset
pub fn csv_timestamp(at: &DateTime<Utc>, tz: &Tz) -> String {
    let local = at.with_timezone(tz);
    format!(
        "{}.{:03}",
        local.format("%Y-%m-%dT%H:%M:%S"),
        local.timestamp_subsec_millis() % 1000
    )
}

fn csv_error(err: csv::Error) -> SinkError {
    SinkError::Io(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use slmframe::{Decibels, Measurement};

    fn sample(series: Series, at: DateTime<Utc>, tenths: u16) -> Sample {
        Sample {
            series,
            measurement: Measurement {
                level: Decibels::from_tenths(tenths),
                arrival_time: at,
            },
        }
    }

    #[test]
    fn test_csv_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap()
            + chrono::Duration::milliseconds(256);
        assert_eq!(
            "2024-05-02T08:00:00.256",
            csv_timestamp(&at, &chrono_tz::Australia::Sydney)
        );
        assert_eq!("2024-05-01T22:00:00.256", csv_timestamp(&at, &chrono_tz::UTC));

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap()
            + chrono::Duration::milliseconds(7);
        assert_eq!("2024-05-01T22:00:00.007", csv_timestamp(&at, &chrono_tz::UTC));
    }

    #[test]
    fn test_append() {
        let dir = tempfile::tempdir().unwrap();
        let logdir = dir.path().join("logs");
        let mut sink = DailyCsvSink::new(&logdir, chrono_tz::Australia::Sydney);

        // 22:00 UTC is already the next day in Sydney
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap();
        sink.append(&sample(Series::Fine, at, 724)).unwrap();
        sink.append(&sample(Series::Fine, at, 1000)).unwrap();
        sink.append(&sample(Series::Compliance, at, 651)).unwrap();

        let fine = fs::read_to_string(logdir.join("2024-05-02-noise.csv")).unwrap();
        assert_eq!(
            "2024-05-02T08:00:00.000,72.4\n2024-05-02T08:00:00.000,100.0\n",
            fine
        );

        let compliance =
            fs::read_to_string(logdir.join("2024-05-02-noise-compliance.csv")).unwrap();
        assert_eq!("2024-05-02T08:00:00.000,65.1\n", compliance);
    }

    #[test]
    fn test_append_across_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DailyCsvSink::new(dir.path(), chrono_tz::Australia::Sydney);

        // Sydney is UTC+10 in May; local midnight falls at 14:00 UTC
        let before = Utc.with_ymd_and_hms(2024, 5, 1, 13, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 1).unwrap();
        sink.append(&sample(Series::Fine, before, 700)).unwrap();
        sink.append(&sample(Series::Fine, after, 710)).unwrap();

        let first = fs::read_to_string(dir.path().join("2024-05-01-noise.csv")).unwrap();
        assert_eq!("2024-05-01T23:59:59.000,70.0\n", first);

        let second = fs::read_to_string(dir.path().join("2024-05-02-noise.csv")).unwrap();
        assert_eq!("2024-05-02T00:00:01.000,71.0\n", second);

        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(2, files);
    }
}
