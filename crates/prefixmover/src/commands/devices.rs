//! `devices`: list the devices an evacuation would move.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use prefixmover_core::{DeviceId, Directory, Prefix, Selection, select};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct SelectedDevice {
    prefix: Prefix,
    id: DeviceId,
    name: String,
    address: Ipv4Addr,
    os: Option<String>,
    last_seen: Option<DateTime<Utc>>,
}

fn flatten(selections: &[Selection<'_>]) -> Vec<SelectedDevice> {
    selections
        .iter()
        .flat_map(|s| {
            s.candidates.iter().map(|c| SelectedDevice {
                prefix: s.prefix,
                id: c.device.id.clone(),
                name: c.device.name.clone(),
                address: c.address,
                os: c.device.os.clone(),
                last_seen: c.device.last_seen,
            })
        })
        .collect()
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "OS")]
    os: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl From<&SelectedDevice> for DeviceRow {
    fn from(d: &SelectedDevice) -> Self {
        Self {
            prefix: d.prefix.to_string(),
            id: d.id.to_string(),
            name: d.name.clone(),
            address: d.address.to_string(),
            os: d.os.clone().unwrap_or_else(|| "-".into()),
            last_seen: util::format_time(d.last_seen.as_ref()),
        }
    }
}

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let evacuate = config::evacuation_prefixes(&args.prefixes.prefixes)?;
    let cfg = config::load(global)?;
    let client = prefixmover_core::connect(&config::directory_config(&cfg, global)?)?;

    let devices = Directory::list_devices(&client).await?;
    let selected = flatten(&select(&devices, &evacuate));

    let out = output::render_list(global.output, &selected, |d| DeviceRow::from(d), |d| {
        format!("{} {} {}", d.id, d.address, d.name)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
