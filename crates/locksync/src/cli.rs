//! Clap derive structures for the `locksync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// locksync -- keep Nuki smart locks and openers in sync
#[derive(Debug, Parser)]
#[command(
    name = "locksync",
    version,
    about = "Keep Nuki smart locks and openers in sync through the Nuki Web API",
    long_about = "Polls the Nuki Web API for every configured device, publishes\n\
        channel values and online/offline status, and forwards commands\n\
        back to the devices.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, env = "LOCKSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Nuki Web API access token (overrides config and keyring)
    #[arg(long, env = "LOCKSYNC_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synchronize every configured device until interrupted
    Run(RunArgs),

    /// List devices visible to the account
    #[command(alias = "ls")]
    Devices,

    /// Fetch the current status of one device
    Status {
        /// Configured device name or Nuki smartlock id
        device: String,
    },

    /// Send an action to one device
    Action {
        /// Configured device name or Nuki smartlock id
        device: String,

        /// Action code, or one of: unlock, lock, unlatch
        #[arg(value_parser = parse_action)]
        action: i32,

        /// Action option flag
        #[arg(long, default_value_t = 0)]
        option: i32,
    },

    /// Inspect and manage configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Do not scan for new devices in the background
    #[arg(long)]
    pub no_discovery: bool,

    /// Do not read `<device> <channel> <value>` commands from stdin
    #[arg(long)]
    pub no_stdin: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration (token masked)
    Show,

    /// Store the access token in the system keyring
    SetToken,
}

fn parse_action(raw: &str) -> Result<i32, String> {
    match raw.to_ascii_lowercase().as_str() {
        "unlock" => Ok(1),
        "lock" => Ok(2),
        "unlatch" => Ok(3),
        other => other
            .parse()
            .map_err(|_| format!("expected an action code or unlock/lock/unlatch, got '{raw}'")),
    }
}
