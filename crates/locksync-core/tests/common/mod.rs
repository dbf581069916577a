// Shared in-memory fakes for the engine tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;

use locksync_api::{Error, LockApi, Smartlock, SmartlockAction, SmartlockState};
use locksync_core::{
    AccountConnection, DeviceStatus, Scheduler, StateSink, StateValue, TokioScheduler,
};

// ── Fake API ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeState {
    pub devices: Vec<Smartlock>,
    pub list_error: Option<Error>,
    pub fetch_error: Option<Error>,
    pub action_error: Option<Error>,
    pub fetches: Vec<String>,
    pub actions: Vec<(String, SmartlockAction)>,
}

/// `LockApi` double whose answers are set per test and whose calls are
/// recorded.
#[derive(Clone, Default)]
pub struct FakeApi(pub Arc<Mutex<FakeState>>);

impl FakeApi {
    pub fn with_devices(devices: Vec<Smartlock>) -> Self {
        let api = Self::default();
        api.0.lock().unwrap().devices = devices;
        api
    }

    pub fn fail_fetch(&self, err: Option<Error>) {
        self.0.lock().unwrap().fetch_error = err;
    }

    pub fn fail_list(&self, err: Option<Error>) {
        self.0.lock().unwrap().list_error = err;
    }

    pub fn fail_action(&self, err: Option<Error>) {
        self.0.lock().unwrap().action_error = err;
    }

    pub fn fetch_count(&self) -> usize {
        self.0.lock().unwrap().fetches.len()
    }

    pub fn actions(&self) -> Vec<(String, SmartlockAction)> {
        self.0.lock().unwrap().actions.clone()
    }
}

impl LockApi for FakeApi {
    async fn get_smartlocks(&self) -> Result<Vec<Smartlock>, Error> {
        let state = self.0.lock().unwrap();
        match &state.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.devices.clone()),
        }
    }

    async fn get_smartlock(&self, smartlock_id: &str) -> Result<Smartlock, Error> {
        let mut state = self.0.lock().unwrap();
        state.fetches.push(smartlock_id.to_owned());
        if let Some(e) = &state.fetch_error {
            return Err(e.clone());
        }
        Ok(state
            .devices
            .iter()
            .find(|d| d.smartlock_id.to_string() == smartlock_id)
            .cloned()
            .unwrap_or_else(|| lock(0, 0)))
    }

    async fn send_action(&self, smartlock_id: &str, action: &SmartlockAction) -> Result<(), Error> {
        let mut state = self.0.lock().unwrap();
        state.actions.push((smartlock_id.to_owned(), *action));
        match &state.action_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

pub fn lock(id: i64, device_type: i32) -> Smartlock {
    Smartlock {
        smartlock_id: id,
        account_id: Some(1),
        device_type,
        name: Some(format!("Device {id}")),
        firmware_version: Some(132_618),
        state: Some(SmartlockState {
            mode: Some(2),
            state: Some(1),
            battery_charge: Some(84),
            battery_critical: Some(false),
            battery_charging: Some(false),
            keypad_battery_critical: Some(false),
            door_state: Some(2),
            ..SmartlockState::default()
        }),
        update_date: None,
    }
}

pub fn communication(message: &str) -> Error {
    Error::Communication {
        message: message.into(),
    }
}

pub fn unauthorized(message: &str) -> Error {
    Error::Unauthorized {
        message: message.into(),
    }
}

// ── Recording sink ──────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub states: Mutex<Vec<(String, Option<StateValue>)>>,
    pub triggers: Mutex<Vec<(String, String)>>,
    pub statuses: Mutex<Vec<DeviceStatus>>,
}

impl RecordingSink {
    pub fn state_of(&self, channel: &str) -> Option<Option<StateValue>> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, _)| c == channel)
            .map(|(_, v)| *v)
    }

    pub fn statuses(&self) -> Vec<DeviceStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn triggers(&self) -> Vec<(String, String)> {
        self.triggers.lock().unwrap().clone()
    }
}

impl StateSink for RecordingSink {
    fn update_state(&self, channel: &str, value: Option<StateValue>) {
        self.states.lock().unwrap().push((channel.to_owned(), value));
    }

    fn trigger(&self, channel: &str, event: &str) {
        self.triggers
            .lock()
            .unwrap()
            .push((channel.to_owned(), event.to_owned()));
    }

    fn update_status(&self, status: &DeviceStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub fn token() -> SecretString {
    "test-token".to_owned().into()
}

/// Connection handing out clones of `api`, not yet initialized.
pub fn connection(api: &FakeApi) -> AccountConnection<FakeApi> {
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());
    let api = api.clone();
    AccountConnection::new(scheduler, Box::new(move |_| Ok(api.clone())))
}

/// Connection that has finished its probe.
pub async fn initialized(api: &FakeApi) -> AccountConnection<FakeApi> {
    let conn = connection(api);
    conn.initialize(Some(&token())).unwrap();
    settle().await;
    conn
}

/// Let spawned jobs run without moving the paused clock noticeably.
pub async fn settle() {
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
