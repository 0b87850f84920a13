//! State machine logic for the decode loop
//!
//! The state machine has two states:
//!
//! 1. `Receiving`: Reading bytes from the meter and feeding them
//!    to the receiver
//!
//! 2. `Reconnecting`: The meter has gone away, and we are trying
//!    to get it back
//!
//! ```txt
//!   start
//!   ||
//!   \/
//! +-------------+  == read error ==>   +----------------+
//! |  Receiving  |                      |  Reconnecting  |
//! +-------------+  <== reconnected ==  +----------------+
//!   ||                                   ||
//!   \/                                   \/
//!   end of input                         retries exhausted
//! ```
//!
//! Every return to `Receiving` discards any partially-received
//! frame. End of input (from a capture file) ends the run
//! successfully. Running out of reconnection attempts is an error.

use std::time::Duration;

use anyhow::anyhow;
use chrono_tz::Tz;
use log::{error, info, warn};

use slmframe::{
    ByteSource, Clock, Delay, ReceiverEvent, ReceiverStats, RetryError, RetryPolicy, SinkError,
    SlmReceiver, SourceError,
};

use crate::csvlog::csv_timestamp;
use crate::dispatch::{Dispatcher, Job};

/// Start-up notification
pub const STARTUP_MESSAGE: &str = "Sound Level Meter starting";

/// Sent when InfluxDB is unhealthy at start-up
pub const INFLUX_DOWN_MESSAGE: &str = "Sound Level Meter failed to connect to InfluxDB";

/// Everything the decode loop needs
pub struct Context<'a> {
    pub receiver: &'a mut SlmReceiver,
    pub clock: &'a dyn Clock,
    pub dispatcher: &'a mut Dispatcher,
    pub policy: RetryPolicy,
    pub delay: &'a mut dyn Delay,
    pub read_timeout: Duration,
    pub tz: Tz,
}

/// Announce start-up
///
/// Queues the start-up notification and reports the result of the
/// InfluxDB `health` check. An unhealthy database is announced but
/// does not stop the logger.
pub fn announce_startup(dispatcher: &mut Dispatcher, health: Result<String, SinkError>) {
    dispatcher.submit(Job::Notify(STARTUP_MESSAGE.to_owned()));
    info!("Starting Sound Level Meter");

    match health {
        Ok(status) if status == "pass" => info!("Connected to InfluxDB successfully."),
        Ok(status) => {
            error!("InfluxDB reports status \"{}\"", status);
            dispatcher.submit(Job::Notify(INFLUX_DOWN_MESSAGE.to_owned()));
        }
        Err(e) => {
            error!("Exception while connecting to InfluxDB: {}", e);
            dispatcher.submit(Job::Notify(INFLUX_DOWN_MESSAGE.to_owned()));
        }
    }
}

/// Run the application
///
/// Runs the decode loop against `source` until it is exhausted or
/// can no longer be reconnected.
pub fn run(
    ctx: &mut Context<'_>,
    source: &mut dyn ByteSource,
) -> Result<ReceiverStats, anyhow::Error> {
    let mut receiving = State::<Receiving>::new();
    loop {
        match receiving.until_failure(ctx, source) {
            Ok(()) => break,
            Err(reconnecting) => receiving = reconnecting.until_reconnected(ctx, source)?,
        }
    }

    let stats = *ctx.receiver.stats();
    info!("end of input: {}", stats);
    Ok(stats)
}

#[derive(Debug)]
struct State<S> {
    state: S,
}

#[derive(Debug)]
struct Receiving {}

#[derive(Debug)]
struct Reconnecting {
    cause: SourceError,
}

impl State<Receiving> {
    /// Create initial state
    fn new() -> Self {
        State {
            state: Receiving {},
        }
    }

    /// Read bytes until the source fails
    ///
    /// Returns `Ok` at the end of input.
    fn until_failure(
        self,
        ctx: &mut Context<'_>,
        source: &mut dyn ByteSource,
    ) -> Result<(), State<Reconnecting>> {
        loop {
            match source.read_byte(ctx.read_timeout) {
                Ok(Some(byte)) => {
                    if let Some(evt) = ctx.receiver.input(byte, ctx.clock.now()) {
                        handle_event(ctx, &evt);
                    }
                }
                Ok(None) => continue,
                Err(SourceError::Exhausted) => return Ok(()),
                Err(cause) => return Err(State::<Reconnecting>::from(cause)),
            }
        }
    }
}

impl State<Reconnecting> {
    /// Reconnect, as many times as the policy allows
    fn until_reconnected(
        self,
        ctx: &mut Context<'_>,
        source: &mut dyn ByteSource,
    ) -> Result<State<Receiving>, anyhow::Error> {
        warn!("lost the meter: {}", self.state.cause);

        match ctx.policy.run(&mut *ctx.delay, |attempt| {
            info!("reconnecting to the meter (attempt {})", attempt);
            source.reconnect()
        }) {
            Ok(()) => {
                ctx.receiver.reset();
                Ok(self.into())
            }
            Err(RetryError::Exhausted { attempts, last }) if last.is_exhausted() => {
                info!("source ended after {} reconnection attempts", attempts);
                Err(anyhow!("input ended while reconnecting: {}", self.state.cause))
            }
            Err(RetryError::Exhausted { attempts, last }) => Err(anyhow!(
                "unable to reconnect to the meter after {} attempts: {}",
                attempts,
                last
            )),
        }
    }
}

impl From<SourceError> for State<Reconnecting> {
    fn from(cause: SourceError) -> Self {
        Self {
            state: Reconnecting { cause },
        }
    }
}

impl From<State<Reconnecting>> for State<Receiving> {
    fn from(_state: State<Reconnecting>) -> Self {
        info!("meter reconnected");
        Self {
            state: Receiving {},
        }
    }
}

// Log what needs logging and hand the rest to the sinks
fn handle_event(ctx: &mut Context<'_>, evt: &ReceiverEvent) {
    if let Some(fine) = evt.fine() {
        info!(
            "{}, {} dB",
            csv_timestamp(&fine.measurement.arrival_time, &ctx.tz),
            fine.measurement.level
        );
    }
    ctx.dispatcher.dispatch(evt);
}
