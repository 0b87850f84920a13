//! Configuration file
//!
//! ```toml
//! [influxdb]
//! host = "localhost"
//! port = 8086
//! token = "..."
//! org = "acme"
//! bucket = "noise"
//! measurement = "slm"
//! location = "front gate"
//!
//! [pushover]
//! user_key = "..."
//! app_token = "..."
//!
//! [monitoring]
//! maximum_noise_level = 85.0
//! timezone = "Australia/Sydney"
//!
//! [hardware]
//! serial_device = "/dev/ttyUSB0"
//! ```
//!
//! Everything not shown above has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use serde::Deserialize;

use slmframe::{RetryPolicy, SlmReceiverBuilder};

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "slm-log.toml";

/// Complete program configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub influxdb: InfluxConfig,

    #[serde(default)]
    pub pushover: PushoverConfig,

    pub monitoring: MonitoringConfig,

    pub hardware: HardwareConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[influxdb]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxConfig {
    pub host: String,

    #[serde(default = "default_influx_port")]
    pub port: u16,

    pub token: String,
    pub org: String,
    pub bucket: String,

    /// Primary series name. Compliance samples go to
    /// `<measurement>-compliance`.
    pub measurement: String,

    /// Value of the `location` tag
    pub location: String,

    #[serde(default = "default_influx_timeout_ms")]
    pub timeout_ms: u64,
}

/// `[pushover]`
///
/// Delivery is disabled unless both keys are set.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PushoverConfig {
    pub user_key: String,
    pub app_token: String,
    pub title: String,
}

/// `[monitoring]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    /// Violation threshold, in dB
    pub maximum_noise_level: f64,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_compliance_sample_interval_ms")]
    pub compliance_sample_interval_ms: u64,

    /// IANA timezone for CSV file names and timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// `[hardware]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    pub serial_device: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Give up after this many reconnection attempts. Absent means
    /// never give up.
    #[serde(default)]
    pub reconnect_attempts: Option<u32>,
}

/// `[logging]`
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Directory for the daily CSV files
    pub csv_dir: PathBuf,

    /// Notification queue file
    pub notification_queue: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("logs"),
            notification_queue: PathBuf::from("pushover_messages.txt"),
        }
    }
}

impl Config {
    /// Read and validate the configuration file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read --config \"{}\"", path.display()))?;
        let cfg = Self::parse(&text)
            .with_context(|| format!("Invalid configuration in \"{}\"", path.display()))?;
        Ok(cfg)
    }

    /// Parse and validate configuration text
    pub fn parse(text: &str) -> Result<Self, anyhow::Error> {
        let cfg: Config = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.monitoring.sample_interval_ms == 0 {
            return Err(anyhow!("monitoring.sample_interval_ms must be positive"));
        }
        if self.monitoring.compliance_sample_interval_ms == 0 {
            return Err(anyhow!(
                "monitoring.compliance_sample_interval_ms must be positive"
            ));
        }
        if !self.monitoring.maximum_noise_level.is_finite() {
            return Err(anyhow!("monitoring.maximum_noise_level must be a number"));
        }
        if self.hardware.baud_rate == 0 {
            return Err(anyhow!("hardware.baud_rate must be positive"));
        }
        if self.hardware.reconnect_attempts == Some(0) {
            return Err(anyhow!(
                "hardware.reconnect_attempts must be positive; omit it to retry forever"
            ));
        }
        if self.influxdb.measurement.is_empty() {
            return Err(anyhow!("influxdb.measurement must not be empty"));
        }
        self.monitoring.tz()?;
        Ok(())
    }

    /// Receiver settings
    pub fn receiver(&self) -> SlmReceiverBuilder {
        let mut out = SlmReceiverBuilder::new();
        out.with_fine_period_ms(self.monitoring.sample_interval_ms)
            .with_compliance_period_ms(self.monitoring.compliance_sample_interval_ms)
            .with_threshold_db(self.monitoring.maximum_noise_level);
        out
    }

    /// How to reconnect to the meter
    pub fn reconnect_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.hardware.reconnect_attempts,
            Duration::from_millis(self.hardware.reconnect_delay_ms),
        )
    }
}

impl MonitoringConfig {
    /// Log timezone
    pub fn tz(&self) -> Result<Tz, anyhow::Error> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("monitoring.timezone: {}", e))
    }
}

impl PushoverConfig {
    /// True if messages can be delivered
    pub fn is_enabled(&self) -> bool {
        !self.user_key.is_empty() && !self.app_token.is_empty()
    }
}

fn default_influx_port() -> u16 {
    8086
}

fn default_influx_timeout_ms() -> u64 {
    10_000
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_compliance_sample_interval_ms() -> u64 {
    60_000
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}
