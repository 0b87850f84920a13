//! Notification queue and Pushover delivery
//!
//! The logger never talks to Pushover itself. Alerts are appended to
//! a queue file, one per line, and the `notify` subcommand drains the
//! queue and delivers each line. A slow or unreachable Pushover
//! therefore never delays logging.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info};

use slmframe::{Delay, NotificationSink, SinkError};

use crate::config::PushoverConfig;

/// Pushover message API
const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

/// Appends notifications to the queue file
#[derive(Clone, Debug)]
pub struct QueueNotifier {
    path: PathBuf,
}

impl QueueNotifier {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }
}

impl NotificationSink for QueueNotifier {
    fn notify(&mut self, message: &str) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // one message per line
        let line = message.replace(['\r', '\n'], " ");
        writeln!(file, "{}", line)?;
        debug!("queued notification: {}", line);
        Ok(())
    }
}

/// Take every message from the queue file, leaving it empty
///
/// The queue is renamed aside before it is read, so messages
/// appended while draining land in a fresh queue and wait for the
/// next drain. Messages left aside by an interrupted drain are
/// returned first. Blank lines are skipped. A missing queue is
/// created empty.
pub fn drain_queue(path: &Path) -> io::Result<Vec<String>> {
    let aside = aside_path(path);
    let mut text = take_file(&aside)?;
    match fs::rename(path, &aside) {
        Ok(()) => text.push_str(&take_file(&aside)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    // never truncates a queue the logger has already reopened
    OpenOptions::new().create(true).append(true).open(path)?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect())
}

fn aside_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sending");
    PathBuf::from(name)
}

// read and delete; a missing file reads as empty
fn take_file(path: &Path) -> io::Result<String> {
    let mut text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e),
    };
    fs::remove_file(path)?;
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Sends notifications with the Pushover API
pub struct PushoverClient {
    agent: ureq::Agent,
    url: String,
    user_key: String,
    app_token: String,
    title: String,
}

impl PushoverClient {
    pub fn new(cfg: &PushoverConfig) -> Self {
        Self::with_url(cfg, PUSHOVER_URL)
    }

    fn with_url(cfg: &PushoverConfig, url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            agent,
            url: url.to_owned(),
            user_key: cfg.user_key.clone(),
            app_token: cfg.app_token.clone(),
            title: cfg.title.clone(),
        }
    }
}

impl NotificationSink for PushoverClient {
    fn notify(&mut self, message: &str) -> Result<(), SinkError> {
        let mut form = vec![
            ("token", self.app_token.as_str()),
            ("user", self.user_key.as_str()),
            ("message", message),
        ];
        if !self.title.is_empty() {
            form.push(("title", self.title.as_str()));
        }

        match self.agent.post(&self.url).send_form(&form) {
            Ok(resp) => {
                info!("Pushover message sent: {} ({})", message, resp.status());
                Ok(())
            }
            Err(ureq::Error::Status(status, resp)) => Err(SinkError::Rejected {
                status,
                reason: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(t)) => Err(SinkError::Transport(t.to_string())),
        }
    }
}

/// Deliver queued messages once
///
/// Every message taken from the queue is handed to `sink`.
/// Failed deliveries are logged and dropped. Returns the number of
/// messages delivered.
pub fn deliver_once(queue: &Path, sink: &mut dyn NotificationSink) -> io::Result<usize> {
    let mut sent = 0;
    for message in drain_queue(queue)? {
        match sink.notify(&message) {
            Ok(()) => sent += 1,
            Err(e) => error!("unable to deliver notification \"{}\": {}", message, e),
        }
    }
    Ok(sent)
}

/// Deliver queued messages forever
///
/// Checks the queue every `interval`. Queue I/O errors are logged
/// and retried on the next check.
pub fn run_delivery(
    queue: &Path,
    sink: &mut dyn NotificationSink,
    interval: Duration,
    delay: &mut dyn Delay,
) -> ! {
    info!("delivering notifications from \"{}\"", queue.display());
    loop {
        if let Err(e) = deliver_once(queue, sink) {
            error!("unable to read notification queue \"{}\": {}", queue.display(), e);
        }
        delay.delay(interval);
    }
}
