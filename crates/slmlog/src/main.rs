use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{info, warn, LevelFilter};

use slmframe::{ByteSource, RetryError, RetryPolicy, SystemClock, ThreadDelay};

mod app;
mod cli;
mod config;
mod csvlog;
mod dispatch;
mod influx;
mod pushover;
mod serial;

use cli::{Args, CliError, Command};
use config::Config;
use csvlog::DailyCsvSink;
use dispatch::{Dispatcher, Sinks};
use influx::InfluxSink;
use pushover::{PushoverClient, QueueNotifier};
use serial::{ReplaySource, SerialSource};

fn main() {
    match slmlog() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn slmlog() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    let cfg = Config::load(&args.config)?;

    match args.command {
        Some(Command::Notify { interval }) => notify(&cfg, interval),
        None => logger(&args, &cfg),
    }
}

// Deliver queued notifications, forever
fn notify(cfg: &Config, interval_secs: u64) -> Result<(), CliError> {
    if !cfg.pushover.is_enabled() {
        return Err(anyhow!(
            "notification delivery needs pushover.user_key and pushover.app_token"
        )
        .into());
    }

    let mut client = PushoverClient::new(&cfg.pushover);
    pushover::run_delivery(
        &cfg.logging.notification_queue,
        &mut client,
        Duration::from_secs(u64::max(interval_secs, 1)),
        &mut ThreadDelay,
    )
}

// Log the meter until its input ends
fn logger(args: &Args, cfg: &Config) -> Result<(), CliError> {
    let tz = cfg.monitoring.tz()?;
    let influx = InfluxSink::new(&cfg.influxdb);
    let health = influx.health();

    let mut dispatcher = Dispatcher::spawn(Sinks {
        timeseries: Box::new(influx),
        csv: Box::new(DailyCsvSink::new(&cfg.logging.csv_dir, tz)),
        notify: Box::new(QueueNotifier::new(&cfg.logging.notification_queue)),
        measurement: cfg.influxdb.measurement.clone(),
        location: cfg.influxdb.location.clone(),
    })
    .context("Unable to start sink worker")?;
    app::announce_startup(&mut dispatcher, health);

    // file setup: locks stdin in case we need it
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let (mut source, policy) = source_setup(args, cfg, stdin_handle)?;

    let clock = SystemClock::new();
    let mut receiver = cfg.receiver().build_at(0);
    let mut delay = ThreadDelay;
    let mut ctx = app::Context {
        receiver: &mut receiver,
        clock: &clock,
        dispatcher: &mut dispatcher,
        policy,
        delay: &mut delay,
        read_timeout: Duration::from_millis(cfg.hardware.read_timeout_ms),
        tz,
    };
    let result = app::run(&mut ctx, source.as_mut());

    // flush everything out to the sinks
    let dropped = dispatcher.dropped();
    if dropped > 0 {
        warn!("{} records were not written", dropped);
    }
    dispatcher.finish();

    result?;
    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("slmframe", log_filter)
            .filter_module("slmlog", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn source_setup<'stdin>(
    args: &Args,
    cfg: &Config,
    stdin: io::StdinLock<'stdin>,
) -> Result<(Box<dyn ByteSource + 'stdin>, RetryPolicy), anyhow::Error> {
    // a capture has nothing to reconnect to
    let once = RetryPolicy::bounded(1, Duration::ZERO);

    match &args.file {
        Some(_) if args.input_is_stdin() => {
            info!("sound level logger reading standard input");
            if !is_terminal(&std::io::stdin()) {
                Ok((Box::new(ReplaySource::new(io::BufReader::new(stdin))), once))
            } else {
                Err(anyhow!(
                    "cowardly refusing to read meter bytes from a terminal.

Pipe a raw capture of the meter's serial output into this program."
                ))
            }
        }
        Some(file) => {
            info!("sound level logger reading file: \"{}\"", file);
            let rdr = std::fs::File::open(file)
                .with_context(|| format!("Unable to open --file \"{}\"", file))?;
            Ok((Box::new(ReplaySource::new(io::BufReader::new(rdr))), once))
        }
        None => {
            info!(
                "sound level logger reading {} at {} baud",
                cfg.hardware.serial_device, cfg.hardware.baud_rate
            );
            let policy = cfg.reconnect_policy();
            let port = policy
                .run(&mut ThreadDelay, |_| {
                    SerialSource::open(&cfg.hardware.serial_device, cfg.hardware.baud_rate)
                })
                .map_err(|RetryError::Exhausted { last, .. }| last)
                .with_context(|| {
                    format!("Unable to open serial device \"{}\"", cfg.hardware.serial_device)
                })?;
            Ok((Box::new(port), policy))
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
