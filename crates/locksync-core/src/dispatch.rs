// ── Command dispatch ──
//
// Turns an inbound (channel, command) pair into a remote action through the
// device profile, submits it on the scheduler and reports success back so
// the caller can schedule a reconciliation check.

use tracing::{debug, error};

use locksync_api::LockApi;

use crate::account::AccountConnection;
use crate::command::Command;
use crate::profile::DeviceProfile;

pub struct CommandDispatcher<'a, P: ?Sized> {
    profile: &'a P,
}

impl<'a, P: DeviceProfile + ?Sized> CommandDispatcher<'a, P> {
    pub fn new(profile: &'a P) -> Self {
        Self { profile }
    }

    /// Map and submit one command.
    ///
    /// Returns `false`, without touching the network, when the profile does
    /// not recognize the pair. Otherwise the action is sent in the
    /// background through `connection` and `on_sent` runs once the remote
    /// service accepted it. Failures are logged, never retried.
    pub fn dispatch<A: LockApi>(
        &self,
        channel: &str,
        command: &Command,
        connection: &AccountConnection<A>,
        device_id: &str,
        on_sent: impl FnOnce() + Send + 'static,
    ) -> bool {
        let Some(action) = self.profile.map_command(channel, command) else {
            return false;
        };

        let connection = connection.clone();
        let device_id = device_id.to_owned();
        let command = *command;
        let scheduler = connection.scheduler().clone();

        scheduler.execute(Box::pin(async move {
            let id = device_id.clone();
            let sent = connection
                .with_client(move |client| async move { client.send_action(&id, &action).await })
                .await;

            match sent {
                Some(Ok(())) => {
                    debug!(device = %device_id, ?action, "command {command:?} sent");
                    on_sent();
                }
                Some(Err(e)) => {
                    error!(device = %device_id, "failed to send command {command:?}: {e}");
                }
                None => debug!(device = %device_id, "no client installed, command {command:?} dropped"),
            }
        }));
        true
    }
}
