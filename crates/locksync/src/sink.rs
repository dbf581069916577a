// State sink used by `locksync run`: one line per update on stdout, either
// human-readable or as JSON lines.

use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use locksync_core::{DeviceStatus, StateSink, StateValue};

use crate::cli::OutputFormat;

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SinkEvent<'a> {
    State {
        device: &'a str,
        channel: &'a str,
        value: Option<StateValue>,
    },
    Trigger {
        device: &'a str,
        channel: &'a str,
        event: &'a str,
    },
    Status {
        device: &'a str,
        online: bool,
        status: String,
    },
}

pub struct StdoutSink {
    device: String,
    format: OutputFormat,
    quiet: bool,
}

impl StdoutSink {
    pub fn new(device: impl Into<String>, format: OutputFormat, quiet: bool) -> Self {
        Self {
            device: device.into(),
            format,
            quiet,
        }
    }

    fn emit(&self, event: &SinkEvent<'_>, line: impl FnOnce() -> String) {
        if self.quiet {
            return;
        }
        let text = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => match serde_json::to_string(event) {
                Ok(json) => json,
                Err(_) => return,
            },
            OutputFormat::Table | OutputFormat::Plain => line(),
        };
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }
}

impl StateSink for StdoutSink {
    fn update_state(&self, channel: &str, value: Option<StateValue>) {
        let event = SinkEvent::State {
            device: &self.device,
            channel,
            value,
        };
        self.emit(&event, || {
            let shown = value.map_or_else(|| "NULL".to_owned(), |v| v.to_string());
            format!("{}  {channel} = {shown}", self.device)
        });
    }

    fn trigger(&self, channel: &str, event: &str) {
        info!(device = %self.device, channel, event, "trigger fired");
        let ev = SinkEvent::Trigger {
            device: &self.device,
            channel,
            event,
        };
        self.emit(&ev, || format!("{}  {channel} ! {event}", self.device));
    }

    fn update_status(&self, status: &DeviceStatus) {
        info!(device = %self.device, %status, "device status");
        let event = SinkEvent::Status {
            device: &self.device,
            online: status.is_online(),
            status: status.to_string(),
        };
        self.emit(&event, || format!("{}  status: {status}", self.device));
    }
}
