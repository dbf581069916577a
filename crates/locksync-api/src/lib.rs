// locksync-api: Async Rust client for the Nuki Web API

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{DEFAULT_BASE_URL, LockApi, NukiWebClient};
pub use error::Error;
pub use models::{Smartlock, SmartlockAction, SmartlockState};
pub use transport::TransportConfig;
