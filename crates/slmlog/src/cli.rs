use std::fmt::Display;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_FILE;

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program reads a sound level meter over its serial port, logs one level per sample interval, and raises an alert when the rolling median level exceeds the configured limit.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program reads a sound level meter over its serial port, logs one level per sample interval, and raises an alert when the rolling median level exceeds the configured limit.

Levels are written to InfluxDB and to daily CSV files. Alerts are appended to a notification queue file. Run a second copy of this program with the "notify" subcommand to deliver queued alerts to Pushover:

    slmlog --config slm-log.toml
    slmlog --config slm-log.toml notify

You can replay a raw capture of the meter's serial output instead of reading the device:

    slmlog --file capture.bin

The replay runs until the end of the file. Replayed levels are stamped with the time they are read, not the time they were captured.
"#;

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even warnings
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file
    #[arg(short, long, default_value_t = DEFAULT_CONFIG_FILE.to_string())]
    pub config: String,

    /// Replay a raw capture (or "-" for stdin) instead of the meter
    ///
    /// The input must be the meter's raw serial byte stream. The
    /// [hardware] section of the configuration is ignored.
    #[arg(long)]
    pub file: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Deliver queued alerts to Pushover, forever
    ///
    /// Checks the notification queue every few seconds. Each line
    /// in the queue is sent as one message, and the queue is
    /// emptied.
    Notify {
        /// Seconds between checks of the queue
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

impl Args {
    /// Return true if the user requests replay from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file.as_deref() == Some(STDIN_FILE)
    }
}

/// Fatal error from the logger, with the exit status to report
///
/// Bad configuration, an unopenable meter, and reconnection giving
/// up all exit with status 1. `--help` and `--version` exit with 0.
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Wrap `error`, to exit with status `code`
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Write the error to stderr
    ///
    /// Argument errors keep clap's own rendering. Everything else,
    /// including config and serial port errors, is styled to match.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Report the error and end the process
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        // --help and --version arrive as "errors" on stdout
        let code = i32::from(err.use_stderr());
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse() {
        let args = Args::try_parse_from(["slmlog", "-vv", "--file", "-"]).unwrap();
        assert_eq!(2, args.verbose);
        assert_eq!(DEFAULT_CONFIG_FILE, args.config);
        assert!(args.input_is_stdin());
        assert_eq!(None, args.command);

        let args =
            Args::try_parse_from(["slmlog", "--config", "/etc/slm.toml", "notify"]).unwrap();
        assert_eq!("/etc/slm.toml", args.config);
        assert!(!args.input_is_stdin());
        assert_eq!(Some(Command::Notify { interval: 5 }), args.command);
    }

    #[test]
    fn test_cli_error_codes() {
        let err = Args::try_parse_from(["slmlog", "--bogus"]).unwrap_err();
        assert_eq!(1, CliError::from(err).exit_code());

        let err = Args::try_parse_from(["slmlog", "--help"]).unwrap_err();
        assert_eq!(0, CliError::from(err).exit_code());
    }
}
