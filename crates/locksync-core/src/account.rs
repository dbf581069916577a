// ── Account connection ──
//
// One credential, one lazily built API client, one published connectivity
// status. Device synchronizers borrow the client through `with_client` and
// react to every status change the connection publishes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use locksync_api::{Error as ApiError, LockApi, NukiWebClient};

use crate::config::AccountConfig;
use crate::error::CoreError;
use crate::scheduler::Scheduler;

pub const MISSING_TOKEN_DETAIL: &str = "Missing accessToken configuration property";

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeOfflineReason {
    CommunicationError,
    NotConfigured,
}

/// Connectivity of the account connection, as seen by its dependents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BridgeStatus {
    /// Credential present, probe not finished yet.
    #[default]
    Unknown,
    Online,
    Offline {
        reason: BridgeOfflineReason,
        message: String,
    },
    /// The connection was torn down.
    Removed,
}

impl BridgeStatus {
    fn offline(reason: BridgeOfflineReason, message: impl Into<String>) -> Self {
        Self::Offline {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::Online => f.write_str("ONLINE"),
            Self::Offline { reason, message } => write!(f, "OFFLINE ({reason}): {message}"),
            Self::Removed => f.write_str("REMOVED"),
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Builds an API client for a credential.
pub type ClientFactory<A> = Box<dyn Fn(&SecretString) -> Result<A, ApiError> + Send + Sync>;

struct AccountInner<A> {
    scheduler: Arc<dyn Scheduler>,
    factory: ClientFactory<A>,
    client: ArcSwapOption<A>,
    status: watch::Sender<BridgeStatus>,
}

/// Shared handle to one account's API client and connectivity status.
///
/// Cheaply cloneable; all clones observe the same client and status.
pub struct AccountConnection<A: LockApi = NukiWebClient> {
    inner: Arc<AccountInner<A>>,
}

impl<A: LockApi> Clone for AccountConnection<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AccountConnection<NukiWebClient> {
    /// Connection that builds a [`NukiWebClient`] from `config`'s endpoint and
    /// transport settings. Call [`initialize`](Self::initialize) with the
    /// credential afterwards.
    pub fn nuki_web(scheduler: Arc<dyn Scheduler>, config: &AccountConfig) -> Self {
        let base_url = config.base_url.clone();
        let transport = config.transport.clone();
        Self::new(
            scheduler,
            Box::new(move |token| NukiWebClient::with_base_url(&base_url, token, &transport)),
        )
    }
}

impl<A: LockApi> AccountConnection<A> {
    pub fn new(scheduler: Arc<dyn Scheduler>, factory: ClientFactory<A>) -> Self {
        let (status, _) = watch::channel(BridgeStatus::Unknown);
        Self {
            inner: Arc::new(AccountInner {
                scheduler,
                factory,
                client: ArcSwapOption::empty(),
                status,
            }),
        }
    }

    /// Connection around an already built client, for single CLI calls.
    ///
    /// No probe runs and the status stays `Unknown`; `with_client` works
    /// immediately.
    pub fn oneshot(scheduler: Arc<dyn Scheduler>, client: A) -> Self {
        let connection = Self::new(
            scheduler,
            Box::new(|_| {
                Err(ApiError::Communication {
                    message: "one-shot connection cannot be re-initialized".into(),
                })
            }),
        );
        connection.inner.client.store(Some(Arc::new(client)));
        connection
    }

    /// Install the credential and probe it in the background.
    ///
    /// Without a credential the connection reports `NotConfigured` and a
    /// configuration error is returned. Otherwise the client is built and
    /// stored immediately; the probe outcome is published as `Online` or
    /// `Offline(CommunicationError)`. There is no retry.
    pub fn initialize(&self, access_token: Option<&SecretString>) -> Result<(), CoreError> {
        trace!("initialize()");
        let Some(token) = access_token else {
            debug!("cannot initialize account connection: missing access token");
            self.publish(BridgeStatus::offline(
                BridgeOfflineReason::NotConfigured,
                MISSING_TOKEN_DETAIL,
            ));
            return Err(CoreError::config(MISSING_TOKEN_DETAIL));
        };

        let client = match (self.inner.factory)(token) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("failed to build API client: {e}");
                self.publish(BridgeStatus::offline(
                    BridgeOfflineReason::CommunicationError,
                    e.message(),
                ));
                return Err(e.into());
            }
        };
        self.inner.client.store(Some(Arc::clone(&client)));

        let this = self.clone();
        self.inner.scheduler.execute(Box::pin(async move {
            let outcome = client.probe().await;

            // A dispose or re-initialize during the probe wins.
            let current = this.inner.client.load();
            if !current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &client)) {
                return;
            }
            drop(current);

            match outcome {
                Ok(()) => {
                    debug!("account connection initialized");
                    this.publish(BridgeStatus::Online);
                }
                Err(e) => {
                    warn!(
                        "failed to initialize account connection - invalid access token: {}",
                        e.message()
                    );
                    this.publish(BridgeStatus::offline(
                        BridgeOfflineReason::CommunicationError,
                        e.message(),
                    ));
                }
            }
        }));
        Ok(())
    }

    /// Run `f` with the live client. Returns `None` without running `f` when
    /// no client is installed.
    pub async fn with_client<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce(Arc<A>) -> Fut,
        Fut: Future<Output = T>,
    {
        let client = self.inner.client.load_full()?;
        Some(f(client).await)
    }

    pub fn status(&self) -> BridgeStatus {
        self.inner.status.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        *self.inner.status.borrow() == BridgeStatus::Online
    }

    /// Receiver that observes every status change from now on.
    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.inner.status.subscribe()
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    /// Drop the client and report `Removed`.
    pub fn dispose(&self) {
        trace!("dispose()");
        self.inner.client.store(None);
        self.publish(BridgeStatus::Removed);
    }

    fn publish(&self, status: BridgeStatus) {
        self.inner.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!(from = %current, to = %status, "account connection status changed");
            *current = status;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use locksync_api::{Smartlock, SmartlockAction};

    use super::*;
    use crate::scheduler::TokioScheduler;

    #[derive(Default)]
    struct ProbeApi {
        fail_with: Option<ApiError>,
        calls: AtomicUsize,
    }

    impl LockApi for ProbeApi {
        async fn get_smartlocks(&self) -> Result<Vec<Smartlock>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(Vec::new()),
            }
        }

        async fn get_smartlock(&self, _id: &str) -> Result<Smartlock, ApiError> {
            Err(ApiError::Communication {
                message: "unused".into(),
            })
        }

        async fn send_action(&self, _id: &str, _a: &SmartlockAction) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn connection(fail_with: Option<ApiError>) -> AccountConnection<ProbeApi> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());
        AccountConnection::new(
            scheduler,
            Box::new(move |_| {
                Ok(ProbeApi {
                    fail_with: fail_with.clone(),
                    calls: AtomicUsize::new(0),
                })
            }),
        )
    }

    fn token() -> SecretString {
        "t0k3n".to_owned().into()
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let conn = connection(None);

        let err = conn.initialize(None).expect_err("must fail without token");

        assert_eq!(err, CoreError::config(MISSING_TOKEN_DETAIL));
        assert_eq!(
            conn.status(),
            BridgeStatus::offline(BridgeOfflineReason::NotConfigured, MISSING_TOKEN_DETAIL)
        );
        assert_eq!(conn.with_client(|_| async { 1 }).await, None);
    }

    #[tokio::test]
    async fn successful_probe_goes_online() {
        let conn = connection(None);
        let mut rx = conn.subscribe();

        conn.initialize(Some(&token())).expect("token present");
        rx.changed().await.expect("status published");

        assert!(conn.is_online());
        let calls = conn
            .with_client(|c| async move { c.calls.load(Ordering::SeqCst) })
            .await;
        assert_eq!(calls, Some(1));
    }

    #[tokio::test]
    async fn failed_probe_goes_offline_with_message() {
        let conn = connection(Some(ApiError::Unauthorized {
            message: "bad token".into(),
        }));

        conn.initialize(Some(&token())).expect("token present");
        settle().await;

        assert_eq!(
            conn.status(),
            BridgeStatus::offline(BridgeOfflineReason::CommunicationError, "bad token")
        );
        assert!(
            conn.with_client(|_| async {}).await.is_some(),
            "client stays installed after a failed probe"
        );
    }

    #[tokio::test]
    async fn oneshot_serves_client_without_probe() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());
        let conn = AccountConnection::oneshot(scheduler, ProbeApi::default());
        settle().await;

        assert_eq!(conn.status(), BridgeStatus::Unknown);
        let calls = conn
            .with_client(|c| async move { c.calls.load(Ordering::SeqCst) })
            .await;
        assert_eq!(calls, Some(0));
    }

    #[tokio::test]
    async fn dispose_removes_client() {
        let conn = connection(None);
        conn.initialize(Some(&token())).expect("token present");
        settle().await;

        conn.dispose();

        assert_eq!(conn.status(), BridgeStatus::Removed);
        assert_eq!(conn.with_client(|_| async { 1 }).await, None);
    }
}
