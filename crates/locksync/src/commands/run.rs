//! `locksync run`: synchronize every configured device until interrupted.
//!
//! State changes go to stdout through [`StdoutSink`]. Commands are read from
//! stdin as `<device> <channel> <value>` lines, where `<value>` is `REFRESH`,
//! `ON`/`OFF` or a number.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use locksync_core::{
    AccountConnection, Command, DeviceSynchronizer, DiscoveredDevice, DiscoveryService,
    profile_for,
};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::sink::StdoutSink;

type StdinLines = Lines<BufReader<Stdin>>;

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let account = super::account(global, &cfg);

    let connection = AccountConnection::nuki_web(super::scheduler(), &account);
    if let Err(e) = connection.initialize(account.access_token.as_ref()) {
        warn!("account connection not ready: {e}");
    }

    if cfg.devices.is_empty() {
        warn!("no devices configured; add [[devices]] entries to the config file");
    }
    let synchronizers: HashMap<String, DeviceSynchronizer> = cfg
        .devices
        .iter()
        .map(|device| {
            let sink = Arc::new(StdoutSink::new(&device.name, global.output, global.quiet));
            let sync = DeviceSynchronizer::new(
                device.name.clone(),
                device.device_config(),
                profile_for(device.kind),
                connection.clone(),
                sink,
            );
            sync.start();
            (device.name.clone(), sync)
        })
        .collect();
    info!(devices = synchronizers.len(), "synchronization started");

    let configured: HashSet<String> = cfg
        .devices
        .iter()
        .filter_map(|d| d.smartlock_id.clone())
        .collect();
    let (discovery_job, mut discovered) = if args.no_discovery || cfg.discovery_interval == 0 {
        (None, None)
    } else {
        let service = Arc::new(DiscoveryService::new(connection.clone()));
        let (job, rx) = service.start(Duration::from_secs(cfg.discovery_interval));
        (Some(job), Some(rx))
    };

    let mut stdin = (!args.no_stdin).then(|| BufReader::new(tokio::io::stdin()).lines());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            found = next_discovered(&mut discovered) => match found {
                Some(device) if !configured.contains(&device.smartlock_id) => {
                    info!(
                        smartlock_id = %device.smartlock_id,
                        kind = %device.kind,
                        name = device.name.as_deref().unwrap_or("-"),
                        "discovered unconfigured device"
                    );
                }
                Some(_) => {}
                None => discovered = None,
            },
            line = next_line(&mut stdin) => match line {
                Ok(Some(line)) => handle_line(&synchronizers, &line),
                Ok(None) => {
                    debug!("stdin closed");
                    stdin = None;
                }
                Err(e) => {
                    warn!("failed to read stdin: {e}");
                    stdin = None;
                }
            },
        }
    }

    info!("shutting down");
    if let Some(job) = discovery_job {
        job.cancel();
    }
    for sync in synchronizers.values() {
        sync.dispose();
    }
    connection.dispose();
    Ok(())
}

async fn next_discovered(
    rx: &mut Option<UnboundedReceiver<DiscoveredDevice>>,
) -> Option<DiscoveredDevice> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_line(lines: &mut Option<StdinLines>) -> io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

fn handle_line(synchronizers: &HashMap<String, DeviceSynchronizer>, line: &str) {
    let (device, channel, command) = match parse_line(line) {
        None => return,
        Some(Ok(parsed)) => parsed,
        Some(Err(reason)) => {
            warn!("ignoring input line {line:?}: {reason}");
            return;
        }
    };
    let Some(sync) = synchronizers.get(device) else {
        warn!(device, "ignoring command for unknown device");
        return;
    };
    if !sync.handle_command(channel, &command) {
        warn!(device, channel, ?command, "command not accepted");
    }
}

/// `None` for blank lines.
fn parse_line(line: &str) -> Option<Result<(&str, &str, Command), String>> {
    let mut parts = line.split_whitespace();
    let device = parts.next()?;
    let (Some(channel), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Some(Err("expected `<device> <channel> <value>`".into()));
    };
    Some(
        value
            .parse::<Command>()
            .map(|command| (device, channel, command))
            .map_err(|e| e.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_device_channel_and_value() {
        assert_eq!(
            parse_line("front lock ON"),
            Some(Ok(("front", "lock", Command::OnOff(true))))
        );
        assert_eq!(
            parse_line("  door   lockState 2 "),
            Some(Ok(("door", "lockState", Command::Decimal(2))))
        );
        assert_eq!(
            parse_line("front lock refresh"),
            Some(Ok(("front", "lock", Command::Refresh)))
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(matches!(parse_line("front lock"), Some(Err(_))));
        assert!(matches!(parse_line("front lock ON extra"), Some(Err(_))));
        assert!(matches!(parse_line("front lock maybe"), Some(Err(_))));
    }
}
