//! `evacuate`: move every selected device to a random free address.

use serde::Serialize;
use tabled::Tabled;

use prefixmover_core::{
    CommitMode, OutcomeResult, Orchestrator, ReassignmentOutcome, RunReport, RunStatus,
};

use crate::cli::{EvacuateArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

/// What structured output formats emit.
#[derive(Serialize)]
struct RunSummary<'a> {
    status: RunStatus,
    succeeded: usize,
    #[serde(flatten)]
    report: &'a RunReport,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Old Address")]
    previous: String,
    #[tabled(rename = "New Address")]
    address: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl From<&ReassignmentOutcome> for OutcomeRow {
    fn from(o: &ReassignmentOutcome) -> Self {
        let result = match &o.result {
            OutcomeResult::Moved { attempts, .. } => format!("moved ({attempts} attempt(s))"),
            OutcomeResult::Previewed { .. } => "would move".into(),
            OutcomeResult::Failed { kind, cause } => format!("{kind}: {cause}"),
        };
        Self {
            id: o.device_id.to_string(),
            name: o.device_name.clone(),
            prefix: o.evacuated_from.to_string(),
            previous: o.previous.to_string(),
            address: o
                .new_address()
                .map_or_else(|| "-".into(), |a| a.to_string()),
            result,
        }
    }
}

fn plain_line(o: &ReassignmentOutcome) -> String {
    let address = o
        .new_address()
        .map_or_else(|| "-".into(), |a| a.to_string());
    let result = match o.result {
        OutcomeResult::Moved { .. } => "moved",
        OutcomeResult::Previewed { .. } => "previewed",
        OutcomeResult::Failed { .. } => "failed",
    };
    format!("{} {} {} {}", o.device_id, o.previous, address, result)
}

/// One-line verdict for the end of a table.
fn summary_line(report: &RunReport, evacuated: &str) -> (String, Tone) {
    match report.status() {
        RunStatus::NoMatches => (format!("No devices found in {evacuated}"), Tone::Warn),
        RunStatus::Succeeded { moved } => match report.mode {
            CommitMode::Apply => (format!("Moved {moved} device(s)"), Tone::Good),
            CommitMode::DryRun => (
                format!("Dry run: {moved} device(s) would move, nothing changed"),
                Tone::Good,
            ),
        },
        RunStatus::Failed { failures } => (
            format!("{} device(s) moved, {failures} failed", report.succeeded()),
            Tone::Bad,
        ),
        RunStatus::Interrupted { failures } => (
            format!(
                "Interrupted after {} device(s), {failures} failed",
                report.outcomes.len()
            ),
            Tone::Warn,
        ),
    }
}

fn render(report: &RunReport, evacuated: &str, global: &GlobalOpts) -> Result<String, CliError> {
    let summary = RunSummary {
        status: report.status(),
        succeeded: report.succeeded(),
        report,
    };
    let color = output::should_color(global.color);

    output::render_single(
        global.output,
        &summary,
        |s| {
            let (line, tone) = summary_line(s.report, evacuated);
            let line = output::paint(&line, tone, color);
            if s.report.outcomes.is_empty() {
                line
            } else {
                let rows: Vec<OutcomeRow> = s.report.outcomes.iter().map(OutcomeRow::from).collect();
                format!("{}\n{line}", output::render_table(&rows))
            }
        },
        |s| {
            s.report
                .outcomes
                .iter()
                .map(plain_line)
                .collect::<Vec<_>>()
                .join("\n")
        },
    )
}

pub async fn handle(args: EvacuateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let move_config = config::move_config(&cfg, &args)?;
    let directory = config::directory_config(&cfg, global)?;
    let evacuated = util::join_prefixes(move_config.evacuate());

    if move_config.commit_mode() == CommitMode::Apply {
        let prompt = format!(
            "Move every device in {evacuated} on tailnet '{}' to a new address?",
            directory.tailnet
        );
        if !util::confirm("evacuate", &prompt, global.yes)? {
            output::print_output("Aborted.", global.quiet);
            return Ok(());
        }
    }

    let client = prefixmover_core::connect(&directory)?;
    let report = Orchestrator::new(&move_config, &client)
        .with_cancellation(util::cancel_on_ctrl_c())
        .run()
        .await?;

    let out = render(&report, &evacuated, global)?;
    output::print_output(&out, global.quiet);

    match report.status() {
        RunStatus::NoMatches | RunStatus::Succeeded { .. } => Ok(()),
        RunStatus::Failed { failures } => Err(CliError::RunFailed { failures }),
        RunStatus::Interrupted { failures } => Err(CliError::Interrupted { failures }),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use prefixmover_core::{DeviceId, FailureKind, Prefix};

    use super::*;

    fn outcome(result: OutcomeResult) -> ReassignmentOutcome {
        ReassignmentOutcome {
            device_id: DeviceId::new("n1"),
            device_name: "laptop".into(),
            evacuated_from: Prefix::CGNAT,
            previous: Ipv4Addr::new(100, 64, 0, 5),
            result,
        }
    }

    #[test]
    fn plain_line_reports_old_and_new_address() {
        let line = plain_line(&outcome(OutcomeResult::Moved {
            address: Ipv4Addr::new(100, 65, 3, 10),
            attempts: 2,
        }));
        assert_eq!(line, "n1 100.64.0.5 100.65.3.10 moved");
    }

    #[test]
    fn failed_row_carries_the_cause() {
        let row = OutcomeRow::from(&outcome(OutcomeResult::Failed {
            kind: FailureKind::RetriesExhausted,
            cause: "Unable to set a new address after 5 tries".into(),
        }));
        assert_eq!(row.address, "-");
        assert!(row.result.starts_with("retries_exhausted"));
        assert!(row.result.contains("after 5 tries"));
    }
}
