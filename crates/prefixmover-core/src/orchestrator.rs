// ── Evacuation run orchestration ──
//
// One pass over a single directory snapshot. Evacuation prefixes are
// processed in configured order, each with its own device loop; the
// stop-on-error policy abandons only the loop it fires in.

use std::net::Ipv4Addr;

use rand::Rng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::allocator::Allocator;
use crate::config::{CommitMode, ErrorPolicy, MoveConfig};
use crate::directory::Directory;
use crate::error::CoreError;
use crate::model::{Device, DeviceId};
use crate::prefix::Prefix;
use crate::prefix_set::PrefixSet;
use crate::sampler::AddressSampler;

// ── Selection ────────────────────────────────────────────────────────

/// A device chosen for reassignment, with the address that matched.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'d> {
    pub device: &'d Device,
    pub address: Ipv4Addr,
}

/// Devices whose primary address lies in one evacuation prefix.
#[derive(Debug, Clone)]
pub struct Selection<'d> {
    pub prefix: Prefix,
    pub candidates: Vec<Candidate<'d>>,
}

/// Group `devices` by the evacuation prefixes their primary IPv4 address
/// falls in, keeping both the prefix order and the snapshot order.
///
/// A device matching several prefixes appears once per match. Devices
/// without an IPv4 primary address are never selected.
pub fn select<'d>(devices: &'d [Device], evacuate: &[Prefix]) -> Vec<Selection<'d>> {
    for device in devices {
        if device.primary_ipv4().is_none() {
            warn!(
                device = %device.id,
                name = %device.name,
                first_address = device.addresses.first().map_or("<none>", String::as_str),
                "device has no IPv4 primary address, skipping"
            );
        }
    }

    evacuate
        .iter()
        .map(|prefix| Selection {
            prefix: *prefix,
            candidates: devices
                .iter()
                .filter_map(|device| {
                    let address = device.primary_ipv4()?;
                    prefix
                        .contains(address)
                        .then_some(Candidate { device, address })
                })
                .collect(),
        })
        .collect()
}

// ── Outcomes ─────────────────────────────────────────────────────────

/// Why a device could not be moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt hit an address already in use.
    RetriesExhausted,
    /// The directory refused the change for another reason.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeResult {
    Moved { address: Ipv4Addr, attempts: u32 },
    /// Dry run: the address the device would have been given.
    Previewed { address: Ipv4Addr },
    Failed { kind: FailureKind, cause: String },
}

/// Per-device result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignmentOutcome {
    pub device_id: DeviceId,
    pub device_name: String,
    pub evacuated_from: Prefix,
    pub previous: Ipv4Addr,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

impl ReassignmentOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.result, OutcomeResult::Failed { .. })
    }

    /// New (or previewed) address, if the device got one.
    pub fn new_address(&self) -> Option<Ipv4Addr> {
        match self.result {
            OutcomeResult::Moved { address, .. } | OutcomeResult::Previewed { address } => {
                Some(address)
            }
            OutcomeResult::Failed { .. } => None,
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// No device sat in any evacuation prefix.
    NoMatches,
    Succeeded { moved: usize },
    Failed { failures: usize },
    /// Cancelled before every selected device was processed.
    Interrupted { failures: usize },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::NoMatches | Self::Succeeded { .. })
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: CommitMode,
    pub pool: PrefixSet,
    pub outcomes: Vec<ReassignmentOutcome>,
    pub failures: usize,
    pub interrupted: bool,
}

impl RunReport {
    fn new(mode: CommitMode, pool: PrefixSet) -> Self {
        Self {
            mode,
            pool,
            outcomes: Vec::new(),
            failures: 0,
            interrupted: false,
        }
    }

    /// Devices that got (or would get) a new address.
    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failures
    }

    /// Decided by the failure counter, not by how many devices were seen.
    pub fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted {
                failures: self.failures,
            }
        } else if self.failures > 0 {
            RunStatus::Failed {
                failures: self.failures,
            }
        } else if self.outcomes.is_empty() {
            RunStatus::NoMatches
        } else {
            RunStatus::Succeeded {
                moved: self.succeeded(),
            }
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────

/// Drives one evacuation run against a directory.
pub struct Orchestrator<'a, D> {
    config: &'a MoveConfig,
    directory: &'a D,
    cancel: CancellationToken,
}

impl<'a, D> Orchestrator<'a, D>
where
    D: Directory + Sync,
{
    pub fn new(config: &'a MoveConfig, directory: &'a D) -> Self {
        Self {
            config,
            directory,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between devices once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fetch the device snapshot. A failure here aborts the whole run.
    pub async fn snapshot(&self) -> Result<Vec<Device>, CoreError> {
        let devices = self.directory.list_devices().await?;
        info!(count = devices.len(), "fetched device snapshot");
        Ok(devices)
    }

    /// Run with an entropy-seeded sampler.
    pub async fn run(&self) -> Result<RunReport, CoreError> {
        self.run_with_sampler(AddressSampler::<StdRng>::from_entropy())
            .await
    }

    /// Run the evacuation with the given sampler.
    ///
    /// Only the initial listing can fail the call; per-device failures are
    /// recorded in the report.
    pub async fn run_with_sampler<R: Rng + Send>(
        &self,
        sampler: AddressSampler<R>,
    ) -> Result<RunReport, CoreError> {
        let devices = self.snapshot().await?;
        let selections = select(&devices, self.config.evacuate());
        let pool = self.config.pool();
        let mode = self.config.commit_mode();
        let policy = self.config.error_policy();

        info!(
            from = ?self.config.evacuate().iter().map(ToString::to_string).collect::<Vec<_>>(),
            pool = %pool,
            %mode,
            %policy,
            "moving devices"
        );

        let mut allocator = Allocator::new(self.directory, sampler, self.config.max_retries())
            .with_commit_mode(mode)
            .with_cancellation(self.cancel.clone());
        let mut report = RunReport::new(mode, pool.clone());

        'prefixes: for selection in &selections {
            for candidate in &selection.candidates {
                if self.cancel.is_cancelled() {
                    report.interrupted = true;
                    break 'prefixes;
                }

                let device = candidate.device;
                let result = match allocator.assign(device, pool).await {
                    Ok(assignment) => match mode {
                        CommitMode::Apply => OutcomeResult::Moved {
                            address: assignment.address,
                            attempts: u32::try_from(assignment.attempts.len()).unwrap_or(u32::MAX),
                        },
                        CommitMode::DryRun => OutcomeResult::Previewed {
                            address: assignment.address,
                        },
                    },
                    Err(CoreError::Cancelled) => {
                        report.interrupted = true;
                        break 'prefixes;
                    }
                    Err(err) => {
                        report.failures += 1;
                        error!(
                            device = %device.id,
                            name = %device.name,
                            error = %err,
                            "error setting address for device"
                        );
                        let kind = match err {
                            CoreError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
                            _ => FailureKind::Rejected,
                        };
                        OutcomeResult::Failed {
                            kind,
                            cause: err.to_string(),
                        }
                    }
                };

                let failed = matches!(result, OutcomeResult::Failed { .. });
                report.outcomes.push(ReassignmentOutcome {
                    device_id: device.id.clone(),
                    device_name: device.name.clone(),
                    evacuated_from: selection.prefix,
                    previous: candidate.address,
                    result,
                });

                if failed && policy == ErrorPolicy::Stop {
                    warn!(prefix = %selection.prefix, "stopping device loop for this prefix");
                    break;
                }
            }
        }

        info!(
            processed = report.outcomes.len(),
            failures = report.failures,
            "done"
        );
        Ok(report)
    }
}
