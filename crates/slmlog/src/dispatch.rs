//! Sink worker thread
//!
//! Every sink call happens on one worker thread. The decode loop hands
//! work over through a bounded channel and never waits for it: if the
//! worker has fallen behind and the channel is full, the work is
//! dropped and counted.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{error, warn};

use slmframe::{
    series_name, CsvAppendSink, NotificationSink, Point, ReceiverEvent, Sample, TimeSeriesSink,
};

/// Work waiting in the channel
const QUEUE_DEPTH: usize = 256;

/// One unit of work for the sinks
#[derive(Clone, Debug, PartialEq)]
pub enum Job {
    /// Write a sample to the database and to CSV
    Record(Sample),

    /// Send a notification
    Notify(String),
}

/// The sinks, owned by the worker
pub struct Sinks {
    pub timeseries: Box<dyn TimeSeriesSink + Send>,
    pub csv: Box<dyn CsvAppendSink + Send>,
    pub notify: Box<dyn NotificationSink + Send>,

    /// Base series name
    pub measurement: String,

    /// `location` tag
    pub location: String,
}

impl Sinks {
    fn handle(&mut self, job: Job) {
        match job {
            Job::Record(sample) => {
                let point = Point::from_sample(&self.measurement, &self.location, &sample);
                if let Err(e) = self.timeseries.write(&point) {
                    error!(
                        "unable to write {} to InfluxDB: {}",
                        series_name(&self.measurement, sample.series),
                        e
                    );
                }
                if let Err(e) = self.csv.append(&sample) {
                    error!("unable to append {} sample to CSV: {}", sample.series, e);
                }
            }
            Job::Notify(message) => {
                if let Err(e) = self.notify.notify(&message) {
                    error!("unable to queue notification \"{}\": {}", message, e);
                }
            }
        }
    }
}

/// Hands work to the sink worker
pub struct Dispatcher {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<Sinks>>,
    dropped: u64,
}

impl Dispatcher {
    /// Start the worker thread
    pub fn spawn(sinks: Sinks) -> std::io::Result<Self> {
        Self::spawn_with_depth(sinks, QUEUE_DEPTH)
    }

    fn spawn_with_depth(sinks: Sinks, depth: usize) -> std::io::Result<Self> {
        let (tx, rx) = bounded(depth);
        let worker = thread::Builder::new()
            .name("sinks".to_owned())
            .spawn(move || run_worker(sinks, rx))?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            dropped: 0,
        })
    }

    /// Queue everything `evt` needs written
    pub fn dispatch(&mut self, evt: &ReceiverEvent) {
        for sample in evt.samples() {
            self.submit(Job::Record(*sample));
        }
        if let Some(violation) = evt.violation() {
            self.submit(Job::Notify(violation.to_string()));
        }
    }

    /// Queue a job without waiting
    ///
    /// Returns false if the job was dropped.
    pub fn submit(&mut self, job: Job) -> bool {
        let tx = match &self.tx {
            Some(tx) => tx,
            None => return false,
        };

        match tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                self.dropped += 1;
                warn!(
                    "sinks are not keeping up; dropped {:?} ({} dropped so far)",
                    job, self.dropped
                );
                false
            }
            Err(TrySendError::Disconnected(job)) => {
                self.dropped += 1;
                error!("sink worker has stopped; dropped {:?}", job);
                false
            }
        }
    }

    /// Count of jobs dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Finish all queued work and stop the worker
    ///
    /// Returns the sinks, unless the worker panicked.
    pub fn finish(mut self) -> Option<Sinks> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Sinks> {
        drop(self.tx.take());
        match self.worker.take()?.join() {
            Ok(sinks) => Some(sinks),
            Err(_) => {
                error!("sink worker panicked");
                None
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(mut sinks: Sinks, rx: Receiver<Job>) -> Sinks {
    for job in rx.iter() {
        sinks.handle(job);
    }
    sinks
}
