//! Command handlers and the helpers they share.

mod config_cmd;
mod devices;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use locksync_api::NukiWebClient;
use locksync_config::{Config, account_config, config_path, load_config_from};
use locksync_core::{AccountConfig, AccountConnection, Scheduler, TokioScheduler};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(&args, global).await,
        Command::Devices => devices::list(global).await,
        Command::Status { device } => devices::status(&device, global).await,
        Command::Action {
            device,
            action,
            option,
        } => devices::action(&device, action, option, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load and validate the config file named by `--config` or the default.
fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    load_config_from(&path).map_err(|source| CliError::Config {
        source,
        path: path.display().to_string(),
    })
}

/// Account settings, with `--access-token` taking precedence.
fn account(global: &GlobalOpts, cfg: &Config) -> AccountConfig {
    account_config(cfg, global.access_token.clone().map(SecretString::from))
}

fn scheduler() -> Arc<dyn Scheduler> {
    Arc::new(TokioScheduler::current())
}

/// Connection for a single request: the client is built up front and no
/// probe runs.
fn oneshot(global: &GlobalOpts, cfg: &Config) -> Result<AccountConnection, CliError> {
    let account = account(global, cfg);
    let token = account
        .access_token
        .as_ref()
        .ok_or_else(|| CliError::NoCredentials {
            path: config_file(global).display().to_string(),
        })?;
    let client = NukiWebClient::with_base_url(&account.base_url, token, &account.transport)?;
    Ok(AccountConnection::oneshot(scheduler(), client))
}

/// A configured device name resolves to its id; anything else is taken as
/// a raw smartlock id.
fn resolve_device(cfg: &Config, device: &str) -> String {
    cfg.device(device)
        .and_then(|d| d.smartlock_id.clone())
        .unwrap_or_else(|| device.to_owned())
}
