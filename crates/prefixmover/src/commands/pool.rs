//! `pool`: show the candidate pool without contacting the directory.

use std::net::Ipv4Addr;

use serde::Serialize;
use tabled::Tabled;

use prefixmover_core::Prefix;

use crate::cli::{GlobalOpts, OutputFormat, PoolArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct PoolEntry {
    prefix: Prefix,
    first: Ipv4Addr,
    last: Ipv4Addr,
    hosts: u64,
}

impl From<&Prefix> for PoolEntry {
    fn from(p: &Prefix) -> Self {
        Self {
            prefix: *p,
            first: p.first(),
            last: p.last(),
            hosts: p.host_count(),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PoolRow {
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "First")]
    first: String,
    #[tabled(rename = "Last")]
    last: String,
    #[tabled(rename = "Addresses")]
    hosts: u64,
}

impl From<&PoolEntry> for PoolRow {
    fn from(e: &PoolEntry) -> Self {
        Self {
            prefix: e.prefix.to_string(),
            first: e.first.to_string(),
            last: e.last.to_string(),
            hosts: e.hosts,
        }
    }
}

pub fn handle(args: &PoolArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let move_config = config::selection_config(&args.prefixes.prefixes, &args.destinations.to)?;
    let pool = move_config.pool();
    let entries: Vec<PoolEntry> = pool.iter().map(PoolEntry::from).collect();

    let out = output::render_list(global.output, &entries, |e| PoolRow::from(e), |e| {
        e.prefix.to_string()
    })?;
    output::print_output(&out, global.quiet);

    if global.output == OutputFormat::Table {
        let summary = format!(
            "{} prefix(es), {} addresses",
            pool.len(),
            pool.host_count()
        );
        output::print_output(&summary, global.quiet);
    }
    Ok(())
}
