// ── Device profiles ──
//
// A profile is the per-variant half of a synchronizer: how a status
// snapshot maps onto channels, and which (channel, command) pairs turn into
// a remote action. The scheduling state machine is shared.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use locksync_api::{Smartlock, SmartlockAction, SmartlockState};

use crate::command::Command;
use crate::sink::StateValue;

// ── Channel ids ──────────────────────────────────────────────────────

pub const CHANNEL_BATTERY_LEVEL: &str = "batteryLevel";
pub const CHANNEL_LOW_BATTERY: &str = "lowBattery";
pub const CHANNEL_KEYPAD_LOW_BATTERY: &str = "keypadLowBattery";
pub const CHANNEL_BATTERY_CHARGING: &str = "batteryCharging";
pub const CHANNEL_LOCK_STATE: &str = "lockState";
pub const CHANNEL_LOCK: &str = "lock";
pub const CHANNEL_DOOR_STATE: &str = "doorsensorState";
pub const CHANNEL_OPENER_STATE: &str = "openerState";
pub const CHANNEL_OPENER_MODE: &str = "openerMode";
pub const CHANNEL_RING_ACTION: &str = "openerRingAction";

pub const EVENT_RINGING: &str = "RINGING";

/// Lock action codes used by the `lock` switch channel.
const ACTION_UNLOCK: i32 = 1;
const ACTION_LOCK: i32 = 2;

// ── Device kind ──────────────────────────────────────────────────────

/// The device variants this engine knows how to synchronize.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[strum(serialize = "smartlock")]
    SmartLock,
    Opener,
}

impl DeviceKind {
    /// Map a Web API `type` code. Smart doors are driven like smart locks.
    pub fn from_type_code(code: i32) -> Option<Self> {
        match code {
            0 | 3 | 4 => Some(Self::SmartLock),
            2 => Some(Self::Opener),
            _ => None,
        }
    }
}

/// Human label for a Web API `type` code.
pub fn type_label(code: i32) -> Option<&'static str> {
    match code {
        0 => Some("Smart Lock 1.0/2.0"),
        2 => Some("Opener"),
        3 => Some("Smart Door"),
        4 => Some("Smart Lock 3.0"),
        _ => None,
    }
}

// ── Profile trait ────────────────────────────────────────────────────

/// One thing a profile wants published after a status fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    State {
        channel: &'static str,
        value: Option<StateValue>,
    },
    Trigger {
        channel: &'static str,
        event: &'static str,
    },
}

impl StateUpdate {
    fn state(channel: &'static str, value: Option<impl Into<StateValue>>) -> Self {
        Self::State {
            channel,
            value: value.map(Into::into),
        }
    }
}

/// Variant-specific mapping between snapshots, channels and actions.
pub trait DeviceProfile: Send + Sync + 'static {
    fn kind(&self) -> DeviceKind;

    /// Translate a snapshot into channel updates. A snapshot without a
    /// nested state clears every channel.
    fn apply_status(&self, status: &Smartlock) -> Vec<StateUpdate>;

    /// Translate a command into an action, or `None` if the pair is not
    /// recognized.
    fn map_command(&self, channel: &str, command: &Command) -> Option<SmartlockAction>;
}

impl DeviceProfile for Box<dyn DeviceProfile> {
    fn kind(&self) -> DeviceKind {
        (**self).kind()
    }

    fn apply_status(&self, status: &Smartlock) -> Vec<StateUpdate> {
        (**self).apply_status(status)
    }

    fn map_command(&self, channel: &str, command: &Command) -> Option<SmartlockAction> {
        (**self).map_command(channel, command)
    }
}

/// The built-in profile for a device kind.
pub fn profile_for(kind: DeviceKind) -> Box<dyn DeviceProfile> {
    match kind {
        DeviceKind::SmartLock => Box::new(SmartLockProfile),
        DeviceKind::Opener => Box::new(OpenerProfile::default()),
    }
}

fn decimal_action(n: i64) -> Option<SmartlockAction> {
    i32::try_from(n).ok().map(SmartlockAction::new)
}

// ── Smart lock ───────────────────────────────────────────────────────

/// Smart lock 1.0/2.0/3.0 and smart door.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartLockProfile;

impl DeviceProfile for SmartLockProfile {
    fn kind(&self) -> DeviceKind {
        DeviceKind::SmartLock
    }

    fn apply_status(&self, status: &Smartlock) -> Vec<StateUpdate> {
        let empty = SmartlockState::default();
        let s = status.state.as_ref().unwrap_or(&empty);
        vec![
            StateUpdate::state(CHANNEL_BATTERY_LEVEL, s.battery_charge),
            StateUpdate::state(CHANNEL_LOW_BATTERY, s.battery_critical),
            StateUpdate::state(CHANNEL_KEYPAD_LOW_BATTERY, s.keypad_battery_critical),
            StateUpdate::state(CHANNEL_BATTERY_CHARGING, s.battery_charging),
            StateUpdate::state(CHANNEL_LOCK_STATE, s.state),
            StateUpdate::state(CHANNEL_DOOR_STATE, s.door_state),
        ]
    }

    fn map_command(&self, channel: &str, command: &Command) -> Option<SmartlockAction> {
        match (channel, command) {
            (CHANNEL_LOCK_STATE, Command::Decimal(n)) => decimal_action(*n),
            (CHANNEL_LOCK, Command::OnOff(true)) => Some(SmartlockAction::new(ACTION_LOCK)),
            (CHANNEL_LOCK, Command::OnOff(false)) => Some(SmartlockAction::new(ACTION_UNLOCK)),
            _ => None,
        }
    }
}

// ── Opener ───────────────────────────────────────────────────────────

/// Opener profile. Holds the last ring it reported so a ring that stays
/// flagged across several fetches fires the trigger once.
#[derive(Debug, Default)]
pub struct OpenerProfile {
    last_ring: Mutex<LastRing>,
}

#[derive(Debug, Default)]
struct LastRing {
    at: Option<DateTime<Utc>>,
    ringing: bool,
}

impl OpenerProfile {
    /// A ring is new when its timestamp advances. Without a timestamp, only
    /// the rising edge of the flag counts.
    fn is_new_ring(&self, s: &SmartlockState) -> bool {
        let mut last = self.last_ring.lock().unwrap_or_else(PoisonError::into_inner);
        let ringing = s.ringaction_state == Some(true);
        let fresh = ringing
            && match s.ringaction_timestamp {
                Some(at) => last.at.is_none_or(|seen| at > seen),
                None => !last.ringing,
            };
        if let Some(at) = s.ringaction_timestamp {
            last.at = Some(last.at.map_or(at, |seen| seen.max(at)));
        }
        last.ringing = ringing;
        fresh
    }
}

impl DeviceProfile for OpenerProfile {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Opener
    }

    fn apply_status(&self, status: &Smartlock) -> Vec<StateUpdate> {
        let empty = SmartlockState::default();
        let s = status.state.as_ref().unwrap_or(&empty);
        let mut updates = vec![
            StateUpdate::state(CHANNEL_LOW_BATTERY, s.battery_critical),
            StateUpdate::state(CHANNEL_OPENER_STATE, s.state),
            StateUpdate::state(CHANNEL_OPENER_MODE, s.mode),
        ];
        if self.is_new_ring(s) {
            updates.push(StateUpdate::Trigger {
                channel: CHANNEL_RING_ACTION,
                event: EVENT_RINGING,
            });
        }
        updates
    }

    fn map_command(&self, channel: &str, command: &Command) -> Option<SmartlockAction> {
        match (channel, command) {
            (CHANNEL_OPENER_STATE, Command::Decimal(n)) => decimal_action(*n),
            _ => None,
        }
    }
}
