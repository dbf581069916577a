// Nuki Web API payload types
//
// Only the fields the synchronizer and discovery actually read are modeled;
// everything else in the vendor payload is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One device as returned by `GET /smartlock` and `GET /smartlock/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Smartlock {
    pub smartlock_id: i64,
    #[serde(default)]
    pub account_id: Option<i64>,
    /// Device type code: 0 smart lock 1.0/2.0, 2 opener, 3 smart door,
    /// 4 smart lock 3.0.
    #[serde(rename = "type")]
    pub device_type: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<i64>,
    #[serde(default)]
    pub state: Option<SmartlockState>,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
}

/// Point-in-time device state nested inside [`Smartlock`].
///
/// All fields are optional: the API omits what a device type does not report
/// (an opener has no door sensor, a lock has no ring action).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartlockState {
    #[serde(default)]
    pub mode: Option<i32>,
    #[serde(default)]
    pub state: Option<i32>,
    #[serde(default)]
    pub trigger: Option<i32>,
    #[serde(default)]
    pub last_action: Option<i32>,
    #[serde(default)]
    pub battery_critical: Option<bool>,
    #[serde(default)]
    pub battery_charging: Option<bool>,
    #[serde(default)]
    pub battery_charge: Option<i32>,
    #[serde(default)]
    pub keypad_battery_critical: Option<bool>,
    #[serde(default)]
    pub door_state: Option<i32>,
    #[serde(default)]
    pub ringaction_state: Option<bool>,
    #[serde(default)]
    pub ringaction_timestamp: Option<DateTime<Utc>>,
}

/// Body of `POST /smartlock/{id}/action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartlockAction {
    pub action: i32,
    pub option: i32,
}

impl SmartlockAction {
    pub fn new(action: i32) -> Self {
        Self { action, option: 0 }
    }
}

/// Error body the API sends alongside a non-2xx status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub detail_message: Option<String>,
}
