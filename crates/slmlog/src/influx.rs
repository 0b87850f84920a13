//! InfluxDB v2 writer

use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use slmframe::{Point, SinkError, TimeSeriesSink};

use crate::config::InfluxConfig;

/// Writes points to an InfluxDB v2 bucket over HTTP
///
/// Each point is written on its own as one line of line protocol
/// with nanosecond precision.
pub struct InfluxSink {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxSink {
    pub fn new(cfg: &InfluxConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build();

        Self {
            agent,
            base_url: format!("http://{}:{}", cfg.host, cfg.port),
            token: cfg.token.clone(),
            org: cfg.org.clone(),
            bucket: cfg.bucket.clone(),
        }
    }

    /// Ask the server whether it is healthy
    ///
    /// Returns the server's status string, like `pass`, if it
    /// answered at all.
    pub fn health(&self) -> Result<String, SinkError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.agent.get(&url).call().map_err(http_error)?;
        let body = resp.into_string()?;
        let status = health_status(&body).unwrap_or_else(|| "unknown".to_owned());
        info!("InfluxDB health check returned {}", status);
        Ok(status)
    }
}

impl TimeSeriesSink for InfluxSink {
    fn write(&mut self, point: &Point) -> Result<(), SinkError> {
        let line = line_protocol(point);
        debug!("influxdb: {}", line);

        let url = format!("{}/api/v2/write", self.base_url);
        self.agent
            .post(&url)
            .query("org", &self.org)
            .query("bucket", &self.bucket)
            .query("precision", "ns")
            .set("Authorization", &format!("Token {}", self.token))
            .set("Content-Type", "text/plain; charset=utf-8")
            .send_string(&line)
            .map_err(http_error)?;
        Ok(())
    }
}

fn http_error(err: ureq::Error) -> SinkError {
    match err {
        ureq::Error::Status(status, resp) => SinkError::Rejected {
            status,
            reason: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => SinkError::Transport(t.to_string()),
    }
}

/// Render a point as one line of InfluxDB line protocol
///
/// ```txt
/// measurement,location=front\ gate dB=72.4 1714600800000000000
/// ```
pub fn line_protocol(point: &Point) -> String {
    format!(
        "{},location={} dB={} {}",
        escape(&point.series, &[',', ' ']),
        escape(&point.location, &[',', '=', ' ']),
        point.db,
        timestamp_ns(point)
    )
}

fn timestamp_ns(point: &Point) -> i64 {
    point
        .timestamp
        .timestamp_nanos_opt()
        .unwrap_or_else(|| point.timestamp.timestamp_millis().saturating_mul(1_000_000))
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Body of a `/health` response
///
/// Only the server's overall status matters. Per-check results in
/// `checks` are ignored.
#[derive(Debug, Deserialize)]
struct Health {
    status: String,
}

fn health_status(body: &str) -> Option<String> {
    match serde_json::from_str::<Health>(body) {
        Ok(health) => Some(health.status),
        Err(e) => {
            debug!("unreadable /health response: {}", e);
            None
        }
    }
}
