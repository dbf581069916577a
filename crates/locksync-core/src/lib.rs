//! Device synchronization engine between `locksync-api` and a state host.
//!
//! - **[`AccountConnection`]**: owns the API client for one access token,
//!   probes it in the background and publishes a [`BridgeStatus`] on a
//!   `tokio::sync::watch` channel. Dependents borrow the client through
//!   [`with_client`](AccountConnection::with_client).
//!
//! - **[`DeviceSynchronizer`]**: per-device state machine. Checks are gated
//!   on the bridge being online and a device id being configured; failures
//!   retry after [`RETRY_DELAY`]; a fixed-rate poll job runs only while the
//!   device is online.
//!
//! - **[`CommandDispatcher`]**: maps commands to remote actions through a
//!   [`DeviceProfile`] and schedules a reconciliation check after success.
//!
//! - **[`Scheduler`]**: injected background-job capability. [`TokioScheduler`]
//!   is the production implementation.
//!
//! - **[`DiscoveryService`]**: lists devices through the account and reports
//!   the ones not seen before.

pub mod account;
pub mod command;
pub mod config;
pub mod device;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod profile;
pub mod scheduler;
pub mod sink;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::{AccountConnection, BridgeOfflineReason, BridgeStatus, ClientFactory};
pub use command::Command;
pub use config::{AccountConfig, DeviceConfig};
pub use device::{DeviceStatus, DeviceSynchronizer, OfflineReason, RETRY_DELAY};
pub use discovery::{DiscoveredDevice, DiscoveryService, discover};
pub use dispatch::CommandDispatcher;
pub use error::CoreError;
pub use profile::{DeviceKind, DeviceProfile, OpenerProfile, SmartLockProfile, profile_for};
pub use scheduler::{Job, JobFactory, JobHandle, Scheduler, TokioScheduler};
pub use sink::{StateSink, StateValue};
