//! One-shot device command handlers: list, status, action.

use tabled::Tabled;

use locksync_api::{LockApi, Smartlock, SmartlockAction};
use locksync_core::profile::{StateUpdate, type_label};
use locksync_core::{CoreError, DeviceKind, DiscoveredDevice, discover, profile_for};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    label: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
}

impl From<&DiscoveredDevice> for DeviceRow {
    fn from(d: &DiscoveredDevice) -> Self {
        Self {
            id: d.smartlock_id.clone(),
            name: d.name.clone().unwrap_or_default(),
            label: d.label.into(),
            kind: d.kind.to_string(),
            firmware: d.firmware_version.map(format_firmware).unwrap_or_default(),
        }
    }
}

/// Nuki packs the firmware version into one integer, e.g. 197_891 is 3.5.3.
fn format_firmware(raw: i64) -> String {
    format!("{}.{}.{}", raw >> 16, (raw >> 8) & 0xff, raw & 0xff)
}

fn detail(lock: &Smartlock) -> String {
    let mut lines = vec![
        format!("ID:       {}", lock.smartlock_id),
        format!("Name:     {}", lock.name.as_deref().unwrap_or("-")),
        format!(
            "Type:     {}",
            type_label(lock.device_type).unwrap_or("unsupported")
        ),
        format!(
            "Firmware: {}",
            lock.firmware_version
                .map_or_else(|| "-".into(), format_firmware)
        ),
    ];
    if let Some(updated) = lock.update_date {
        lines.push(format!("Updated:  {}", updated.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    let Some(kind) = DeviceKind::from_type_code(lock.device_type) else {
        return lines.join("\n");
    };
    lines.push(String::new());
    for update in profile_for(kind).apply_status(lock) {
        match update {
            StateUpdate::State { channel, value } => {
                let shown = value.map_or_else(|| "NULL".to_owned(), |v| v.to_string());
                lines.push(format!("{channel:<18} {shown}"));
            }
            StateUpdate::Trigger { channel, event } => {
                lines.push(format!("{channel:<18} ! {event}"));
            }
        }
    }
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let conn = super::oneshot(global, &cfg)?;

    let devices = discover(&conn).await?;
    let out = output::render_list(
        global.output,
        &devices,
        |d| DeviceRow::from(d),
        |d| d.smartlock_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn status(device: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let conn = super::oneshot(global, &cfg)?;
    let id = super::resolve_device(&cfg, device);

    let lock = conn
        .with_client(|client| async move { client.get_smartlock(&id).await })
        .await
        .ok_or(CoreError::NotConnected)??;

    let out = output::render_single(global.output, &lock, detail, |l| {
        l.smartlock_id.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn action(
    device: &str,
    action: i32,
    option: i32,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let conn = super::oneshot(global, &cfg)?;
    let id = super::resolve_device(&cfg, device);
    let request = SmartlockAction { action, option };

    conn.with_client(|client| {
        let id = id.clone();
        async move { client.send_action(&id, &request).await }
    })
    .await
    .ok_or(CoreError::NotConnected)??;

    if !global.quiet {
        eprintln!("Action {action} sent to {id}");
    }
    Ok(())
}
