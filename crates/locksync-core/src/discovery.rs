// ── Device discovery ──
//
// Lists every device visible to the account and reports the ones that can
// be synchronized. Unsupported type codes are skipped with a warning.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use locksync_api::{Error as ApiError, LockApi, NukiWebClient, Smartlock};

use crate::account::AccountConnection;
use crate::error::CoreError;
use crate::profile::{DeviceKind, type_label};
use crate::scheduler::JobHandle;

/// A device found through the account, ready to be configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub smartlock_id: String,
    pub kind: DeviceKind,
    /// Type label, e.g. "Smart Lock 3.0".
    pub label: &'static str,
    pub name: Option<String>,
    pub firmware_version: Option<i64>,
}

impl DiscoveredDevice {
    /// `None` for type codes this engine does not support.
    pub fn from_smartlock(lock: &Smartlock) -> Option<Self> {
        let kind = DeviceKind::from_type_code(lock.device_type)?;
        Some(Self {
            smartlock_id: lock.smartlock_id.to_string(),
            kind,
            label: type_label(lock.device_type)?,
            name: lock.name.clone(),
            firmware_version: lock.firmware_version,
        })
    }
}

fn supported(locks: &[Smartlock]) -> Vec<DiscoveredDevice> {
    locks
        .iter()
        .filter_map(|lock| {
            let found = DiscoveredDevice::from_smartlock(lock);
            if found.is_none() {
                warn!(
                    smartlock_id = lock.smartlock_id,
                    "skipping device - type {} is not supported", lock.device_type
                );
            }
            found
        })
        .collect()
}

/// One-shot listing of every supported device.
pub async fn discover<A: LockApi>(
    connection: &AccountConnection<A>,
) -> Result<Vec<DiscoveredDevice>, CoreError> {
    let locks = connection
        .with_client(|client| async move { client.get_smartlocks().await })
        .await
        .ok_or(CoreError::NotConnected)??;
    Ok(supported(&locks))
}

/// Periodic discovery that only reports devices it has not seen before.
pub struct DiscoveryService<A: LockApi = NukiWebClient> {
    connection: AccountConnection<A>,
    seen: Mutex<HashSet<String>>,
}

impl<A: LockApi> DiscoveryService<A> {
    pub fn new(connection: AccountConnection<A>) -> Self {
        Self {
            connection,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// List devices and return the newly seen ones. Failures are logged and
    /// yield nothing.
    pub async fn scan(&self) -> Vec<DiscoveredDevice> {
        let listed = self
            .connection
            .with_client(|client| async move { client.get_smartlocks().await })
            .await;

        let locks = match listed {
            None => {
                warn!("cannot run discovery - no client available");
                return Vec::new();
            }
            Some(Err(ApiError::Unauthorized { message })) => {
                warn!("discovery failed - token unauthorized: {message}");
                return Vec::new();
            }
            Some(Err(ApiError::Communication { message })) => {
                warn!("discovery failed - communication error: {message}");
                return Vec::new();
            }
            Some(Ok(locks)) => locks,
        };

        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh: Vec<_> = supported(&locks)
            .into_iter()
            .filter(|d| seen.insert(d.smartlock_id.clone()))
            .collect();
        debug!(listed = locks.len(), new = fresh.len(), "discovery scan finished");
        fresh
    }

    /// Scan now and then every `period`, forwarding new devices to the
    /// returned channel until the handle is cancelled. Ticks do nothing once
    /// the receiver is dropped.
    pub fn start(
        self: &Arc<Self>,
        period: Duration,
    ) -> (JobHandle, mpsc::UnboundedReceiver<DiscoveredDevice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = Arc::clone(self);
        let handle = self.connection.scheduler().schedule_at_fixed_rate(
            Duration::ZERO,
            period,
            Box::new(move || {
                let this = Arc::clone(&this);
                let tx = tx.clone();
                Box::pin(async move {
                    if tx.is_closed() {
                        return;
                    }
                    for device in this.scan().await {
                        if tx.send(device).is_err() {
                            break;
                        }
                    }
                })
            }),
        );
        (handle, rx)
    }
}
