//! Address-space bookkeeping and allocation engine for `prefixmover`.
//!
//! Moves tailnet devices whose primary IPv4 address lies inside one or more
//! *evacuation* prefixes onto random free addresses elsewhere in the
//! carrier-grade NAT block (`100.64.0.0/10`):
//!
//! - **[`Prefix`]** / **[`PrefixSet`]** -- masked IPv4 prefixes and the
//!   set arithmetic (union, subtraction, range-to-CIDR decomposition) that
//!   computes the candidate pool.
//! - **[`AddressSampler`]** -- uniform host draws inside a prefix.
//! - **[`Allocator`]** -- the per-device sample/commit/retry protocol.
//! - **[`Orchestrator`]** -- one pass over a device snapshot: selection,
//!   allocation, and failure aggregation under an [`ErrorPolicy`].
//! - **[`Directory`]** -- the seam to the remote device directory,
//!   implemented for [`prefixmover_api::DirectoryClient`].

pub mod allocator;
pub mod config;
pub mod convert;
pub mod directory;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod prefix;
pub mod prefix_set;
pub mod sampler;

// ── Primary re-exports ──────────────────────────────────────────────
pub use allocator::{AllocationAttempt, Allocator, Assignment, AttemptOutcome};
pub use config::{CommitMode, DEFAULT_MAX_RETRIES, DirectoryConfig, ErrorPolicy, MoveConfig};
pub use directory::{Directory, connect};
pub use prefixmover_api::client::DEFAULT_BASE_URL as DEFAULT_API_URL;
pub use error::CoreError;
pub use model::{Device, DeviceId};
pub use orchestrator::{
    Candidate, FailureKind, OutcomeResult, Orchestrator, ReassignmentOutcome, RunReport,
    RunStatus, Selection, select,
};
pub use prefix::Prefix;
pub use prefix_set::{PrefixSet, PrefixSetBuilder};
pub use sampler::AddressSampler;
