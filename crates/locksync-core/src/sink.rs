// ── State sink ──
//
// Where a synchronizer publishes what it learned. The host (the CLI daemon,
// a test recorder, a home-automation bridge) decides what to do with it.

use std::fmt;

use serde::Serialize;

use crate::device::DeviceStatus;

/// A channel value pushed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Decimal(i64),
    OnOff(bool),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(n) => write!(f, "{n}"),
            Self::OnOff(true) => f.write_str("ON"),
            Self::OnOff(false) => f.write_str("OFF"),
        }
    }
}

impl From<i32> for StateValue {
    fn from(n: i32) -> Self {
        Self::Decimal(i64::from(n))
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        Self::OnOff(b)
    }
}

/// Receives channel updates and status transitions for one device.
///
/// Called from scheduler tasks, so implementations must not block.
pub trait StateSink: Send + Sync {
    /// Set a channel value. `None` clears the channel.
    fn update_state(&self, channel: &str, value: Option<StateValue>);

    /// Fire a one-shot event on a trigger channel.
    fn trigger(&self, channel: &str, event: &str);

    /// Report the device's online/offline status.
    fn update_status(&self, status: &DeviceStatus);
}
