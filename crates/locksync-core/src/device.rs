// ── Device synchronizer ──
//
// Per-device scheduling state machine. A status check gates on the bridge
// and the configured id, fetches one snapshot through the account
// connection, hands it to the profile and reschedules itself on failure.
//
// Jobs never own the synchronizer: every scheduled closure captures a
// `Weak` and quietly does nothing once the synchronizer is gone.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use locksync_api::{Error as ApiError, LockApi, NukiWebClient};

use crate::account::AccountConnection;
use crate::command::Command;
use crate::config::DeviceConfig;
use crate::dispatch::CommandDispatcher;
use crate::profile::{DeviceProfile, StateUpdate};
use crate::scheduler::{JobHandle, Scheduler};
use crate::sink::StateSink;

/// Delay before a failed status check is retried. Fixed, no backoff.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

pub const UNAUTHORIZED_DETAIL: &str = "Unauthorized - check access token";
pub const MISSING_ID_DETAIL: &str = "Missing smartLockId configuration property";

// ── Status ───────────────────────────────────────────────────────────

/// Why a device is offline.
///
/// `Unauthorized` is kept apart internally but reported to hosts as a
/// communication error, like every other failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineReason {
    BridgeOffline,
    NotConfigured,
    CommunicationError,
    #[strum(serialize = "COMMUNICATION_ERROR")]
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline {
        reason: OfflineReason,
        detail: Option<String>,
    },
}

impl DeviceStatus {
    pub fn offline(reason: OfflineReason, detail: Option<&str>) -> Self {
        Self::Offline {
            reason,
            detail: detail.map(str::to_owned),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("ONLINE"),
            Self::Offline {
                reason,
                detail: None,
            } => write!(f, "OFFLINE ({reason})"),
            Self::Offline {
                reason,
                detail: Some(detail),
            } => write!(f, "OFFLINE ({reason}): {detail}"),
        }
    }
}

// ── Synchronizer ─────────────────────────────────────────────────────

#[derive(Default)]
struct SyncState {
    config: DeviceConfig,
    /// `None` until the first check completes.
    status: Option<DeviceStatus>,
    status_job: Option<JobHandle>,
    poll_job: Option<JobHandle>,
}

struct SyncInner<A: LockApi, P> {
    label: String,
    profile: P,
    bridge: AccountConnection<A>,
    sink: Arc<dyn StateSink>,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<SyncState>,
    /// Serializes status checks for this device.
    check_lock: tokio::sync::Mutex<()>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

/// Keeps one remote device's state in sync with a [`StateSink`].
///
/// Create with [`new`](Self::new), then [`start`](Self::start). Dropping the
/// synchronizer disposes it.
pub struct DeviceSynchronizer<A: LockApi = NukiWebClient, P: DeviceProfile = Box<dyn DeviceProfile>>
{
    inner: Arc<SyncInner<A, P>>,
}

impl<A: LockApi, P: DeviceProfile> DeviceSynchronizer<A, P> {
    pub fn new(
        label: impl Into<String>,
        config: DeviceConfig,
        profile: P,
        bridge: AccountConnection<A>,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let scheduler = Arc::clone(bridge.scheduler());
        Self {
            inner: Arc::new(SyncInner {
                label: label.into(),
                profile,
                bridge,
                sink,
                scheduler,
                state: Mutex::new(SyncState {
                    config,
                    ..SyncState::default()
                }),
                check_lock: tokio::sync::Mutex::new(()),
                started: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Follow the bridge status and run the first check right away.
    /// Later calls do nothing.
    pub fn start(&self) {
        trace!(device = %self.inner.label, "start()");
        if self.inner.started.swap(true, Ordering::AcqRel) {
            debug!(device = %self.inner.label, "already started");
            return;
        }
        let mut bridge_status = self.inner.bridge.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        self.inner.scheduler.execute(Box::pin(async move {
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    changed = bridge_status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = bridge_status.borrow_and_update().clone();
                        let Some(inner) = weak.upgrade() else { break };
                        trace!(device = %inner.label, %status, "bridge status changed");
                        SyncInner::schedule_status_check(&inner, Duration::ZERO);
                    }
                }
            }
        }));

        SyncInner::schedule_status_check(&self.inner, Duration::ZERO);
    }

    /// Replace the configuration wholesale, re-arm polling and re-check.
    pub fn reconfigure(&self, config: DeviceConfig) {
        debug!(device = %self.inner.label, ?config, "reconfigured");
        {
            let mut state = self.inner.lock_state();
            state.config = config;
            if let Some(job) = state.poll_job.take() {
                job.cancel();
            }
            if state.status.as_ref().is_some_and(DeviceStatus::is_online) {
                SyncInner::start_poll_job(&self.inner, &mut state);
            }
        }
        SyncInner::schedule_status_check(&self.inner, Duration::ZERO);
    }

    /// Handle a command addressed to `channel`.
    ///
    /// Returns `true` when the command was accepted (a refresh, or an action
    /// the profile recognizes). Commands are ignored while no device id is
    /// configured.
    pub fn handle_command(&self, channel: &str, command: &Command) -> bool {
        trace!(device = %self.inner.label, channel, ?command, "handle_command()");
        let Some(device_id) = self.inner.lock_state().config.smartlock_id.clone() else {
            return false;
        };

        if *command == Command::Refresh {
            SyncInner::schedule_status_check(&self.inner, Duration::ZERO);
            return true;
        }

        let weak = Arc::downgrade(&self.inner);
        let accepted = CommandDispatcher::new(&self.inner.profile).dispatch(
            channel,
            command,
            &self.inner.bridge,
            &device_id,
            move || SyncInner::refresh_after_command(&weak),
        );
        if !accepted {
            debug!(device = %self.inner.label, "command {command:?} for channel {channel} not implemented");
        }
        accepted
    }

    /// Cancel every job and stop following the bridge. Idempotent.
    pub fn dispose(&self) {
        trace!(device = %self.inner.label, "dispose()");
        self.inner.shutdown.cancel();
        let mut state = self.inner.lock_state();
        for job in [state.status_job.take(), state.poll_job.take()]
            .into_iter()
            .flatten()
        {
            job.cancel();
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Last published status, `None` before the first check.
    pub fn status(&self) -> Option<DeviceStatus> {
        self.inner.lock_state().status.clone()
    }

    pub fn config(&self) -> DeviceConfig {
        self.inner.lock_state().config.clone()
    }

    pub fn has_pending_status_check(&self) -> bool {
        self.inner
            .lock_state()
            .status_job
            .as_ref()
            .is_some_and(JobHandle::is_live)
    }

    pub fn has_poll_job(&self) -> bool {
        self.inner
            .lock_state()
            .poll_job
            .as_ref()
            .is_some_and(JobHandle::is_live)
    }
}

impl<A: LockApi, P: DeviceProfile> Drop for DeviceSynchronizer<A, P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<A: LockApi, P: DeviceProfile> SyncInner<A, P> {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel any pending check and schedule a new one after `delay`.
    fn schedule_status_check(this: &Arc<Self>, delay: Duration) {
        let mut state = this.lock_state();
        if let Some(job) = state.status_job.take() {
            job.cancel();
        }
        if this.shutdown.is_cancelled() {
            return;
        }

        let weak = Arc::downgrade(this);
        state.status_job = Some(this.scheduler.schedule(
            delay,
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.run_status_check().await;
                }
            }),
        ));
    }

    fn refresh_after_command(weak: &Weak<Self>) {
        let Some(inner) = weak.upgrade() else { return };
        let delay = inner.lock_state().config.refresh_period();
        if let Some(delay) = delay {
            debug!(device = %inner.label, ?delay, "scheduling refresh after command");
            Self::schedule_status_check(&inner, delay);
        }
    }

    fn start_poll_job(this: &Arc<Self>, state: &mut SyncState) {
        let Some(period) = state.config.poll_period() else {
            return;
        };
        debug!(device = %this.label, "scheduling poll job to run every {}s", period.as_secs());
        let weak = Arc::downgrade(this);
        state.poll_job = Some(this.scheduler.schedule_at_fixed_rate(
            period,
            period,
            Box::new(move || {
                let weak = Weak::clone(&weak);
                Box::pin(async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.run_status_check().await;
                    }
                })
            }),
        ));
    }

    async fn run_status_check(self: &Arc<Self>) {
        let _serial = self.check_lock.lock().await;
        if self.shutdown.is_cancelled() {
            return;
        }

        if !self.bridge.is_online() {
            debug!(device = %self.label, "bridge is offline");
            self.update_status(DeviceStatus::offline(OfflineReason::BridgeOffline, None));
            return;
        }

        let device_id = self.lock_state().config.smartlock_id.clone();
        let Some(device_id) = device_id else {
            debug!(device = %self.label, "{MISSING_ID_DETAIL}");
            self.update_status(DeviceStatus::offline(
                OfflineReason::NotConfigured,
                Some(MISSING_ID_DETAIL),
            ));
            return;
        };

        let fetched = self
            .bridge
            .with_client(|client| async move { client.get_smartlock(&device_id).await })
            .await;

        match fetched {
            None => trace!(device = %self.label, "no client installed, skipping check"),
            Some(Ok(snapshot)) => {
                for update in self.profile.apply_status(&snapshot) {
                    match update {
                        StateUpdate::State { channel, value } => {
                            self.sink.update_state(channel, value);
                        }
                        StateUpdate::Trigger { channel, event } => self.sink.trigger(channel, event),
                    }
                }
                self.update_status(DeviceStatus::Online);
            }
            Some(Err(ApiError::Unauthorized { message })) => {
                debug!(device = %self.label, "unauthorized - {message}");
                self.update_status(DeviceStatus::offline(
                    OfflineReason::Unauthorized,
                    Some(UNAUTHORIZED_DETAIL),
                ));
                Self::schedule_status_check(self, RETRY_DELAY);
            }
            Some(Err(ApiError::Communication { message })) => {
                debug!(device = %self.label, "communication error: {message}");
                self.update_status(DeviceStatus::offline(
                    OfflineReason::CommunicationError,
                    Some(&message),
                ));
                Self::schedule_status_check(self, RETRY_DELAY);
            }
        }
    }

    /// Record `status`, re-arm the poll job when crossing the online
    /// boundary, and forward changes to the sink.
    fn update_status(self: &Arc<Self>, status: DeviceStatus) {
        {
            let mut state = self.lock_state();
            if state.status.as_ref() == Some(&status) {
                return;
            }
            let was_online = state.status.as_ref().is_some_and(DeviceStatus::is_online);
            if was_online != status.is_online() {
                if let Some(job) = state.poll_job.take() {
                    if job.cancel() {
                        debug!(device = %self.label, "poll job cancelled");
                    }
                }
                if status.is_online() {
                    Self::start_poll_job(self, &mut state);
                }
            }
            state.status = Some(status.clone());
        }
        debug!(device = %self.label, %status, "device status changed");
        self.sink.update_status(&status);
    }
}
