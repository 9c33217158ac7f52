// ── Run configuration ──
//
// Built once at startup and passed by reference into the orchestrator.
// Nothing here is mutated after validation.

use std::num::NonZeroU32;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;
use crate::prefix::Prefix;
use crate::prefix_set::PrefixSet;

/// Attempts per device when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// How to reach the device directory.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub url: Url,
    pub tailnet: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

/// What to do with the remaining devices of an evacuation prefix after a
/// device fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Abandon the current evacuation prefix; later prefixes still run.
    #[default]
    Stop,
    /// Move on to the next device.
    Continue,
}

/// Whether commits reach the directory.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommitMode {
    #[default]
    Apply,
    /// Select and sample as usual, but never call the directory.
    DryRun,
}

/// Validated, immutable configuration of one evacuation run.
#[derive(Debug, Clone)]
pub struct MoveConfig {
    evacuate: Vec<Prefix>,
    destinations: Option<Vec<Prefix>>,
    parent: Prefix,
    max_retries: NonZeroU32,
    error_policy: ErrorPolicy,
    commit_mode: CommitMode,
    pool: PrefixSet,
}

impl MoveConfig {
    pub fn builder(evacuate: impl IntoIterator<Item = Prefix>) -> MoveConfigBuilder {
        MoveConfigBuilder {
            evacuate: evacuate.into_iter().collect(),
            destinations: None,
            parent: Prefix::CGNAT,
            max_retries: DEFAULT_MAX_RETRIES,
            error_policy: ErrorPolicy::default(),
            commit_mode: CommitMode::default(),
        }
    }

    pub fn evacuate(&self) -> &[Prefix] {
        &self.evacuate
    }

    pub fn destinations(&self) -> Option<&[Prefix]> {
        self.destinations.as_deref()
    }

    pub fn parent(&self) -> Prefix {
        self.parent
    }

    pub fn max_retries(&self) -> NonZeroU32 {
        self.max_retries
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    pub fn commit_mode(&self) -> CommitMode {
        self.commit_mode
    }

    /// Prefixes new addresses are drawn from. Never empty.
    pub fn pool(&self) -> &PrefixSet {
        &self.pool
    }
}

/// Collects run settings; [`build`](Self::build) validates them.
#[derive(Debug, Clone)]
pub struct MoveConfigBuilder {
    evacuate: Vec<Prefix>,
    destinations: Option<Vec<Prefix>>,
    parent: Prefix,
    max_retries: u32,
    error_policy: ErrorPolicy,
    commit_mode: CommitMode,
}

impl MoveConfigBuilder {
    /// Draw new addresses from these prefixes instead of the parent block.
    /// An empty list means "not given".
    pub fn destinations(mut self, destinations: impl IntoIterator<Item = Prefix>) -> Self {
        let destinations: Vec<Prefix> = destinations.into_iter().collect();
        self.destinations = (!destinations.is_empty()).then_some(destinations);
        self
    }

    pub fn parent(mut self, parent: Prefix) -> Self {
        self.parent = parent;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    pub fn build(self) -> Result<MoveConfig, CoreError> {
        if self.evacuate.is_empty() {
            return Err(CoreError::Config {
                message: "at least one prefix to evacuate is required".into(),
            });
        }

        let max_retries = NonZeroU32::new(self.max_retries).ok_or_else(|| CoreError::Config {
            message: "max retries must be at least 1".into(),
        })?;

        let all = self
            .evacuate
            .iter()
            .chain(self.destinations.iter().flatten());
        for prefix in all {
            if !self.parent.contains_prefix(prefix) {
                return Err(CoreError::PrefixOutsideParent {
                    prefix: *prefix,
                    parent: self.parent,
                });
            }
        }

        let pool = candidate_pool(self.parent, &self.evacuate, self.destinations.as_deref())?;
        if pool.is_empty() {
            return Err(CoreError::EmptyPool);
        }

        Ok(MoveConfig {
            evacuate: self.evacuate,
            destinations: self.destinations,
            parent: self.parent,
            max_retries,
            error_policy: self.error_policy,
            commit_mode: self.commit_mode,
            pool,
        })
    }
}

/// Space new addresses may come from.
///
/// Without destinations this is `parent - evacuate`. With destinations it
/// is `destinations - evacuate`, so a device is never moved back into a
/// range that is being emptied.
pub fn candidate_pool(
    parent: Prefix,
    evacuate: &[Prefix],
    destinations: Option<&[Prefix]>,
) -> Result<PrefixSet, CoreError> {
    let mut builder = PrefixSet::builder();
    match destinations {
        Some(destinations) => {
            for prefix in destinations {
                builder.add(*prefix);
            }
        }
        None => {
            builder.add(parent);
        }
    }
    for prefix in evacuate {
        builder.remove(*prefix);
    }
    builder.build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn defaults() {
        let cfg = MoveConfig::builder([p("100.64.0.0/24")]).build().unwrap();
        assert_eq!(cfg.max_retries().get(), DEFAULT_MAX_RETRIES);
        assert_eq!(cfg.error_policy(), ErrorPolicy::Stop);
        assert_eq!(cfg.commit_mode(), CommitMode::Apply);
        assert_eq!(cfg.parent(), Prefix::CGNAT);
        assert!(cfg.destinations().is_none());
        assert_eq!(cfg.pool().host_count(), (1 << 22) - 256);
    }

    #[test]
    fn requires_an_evacuation_prefix() {
        let err = MoveConfig::builder(Vec::<Prefix>::new()).build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn rejects_zero_retries() {
        let err = MoveConfig::builder([p("100.64.0.0/24")])
            .max_retries(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn rejects_prefix_outside_parent() {
        let err = MoveConfig::builder([p("10.0.0.0/8")]).build().unwrap_err();
        assert!(matches!(err, CoreError::PrefixOutsideParent { .. }));

        let err = MoveConfig::builder([p("100.64.0.0/24")])
            .destinations([p("100.128.0.0/16")])
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn evacuating_the_whole_block_leaves_an_empty_pool() {
        let err = MoveConfig::builder([Prefix::CGNAT]).build().unwrap_err();
        assert!(matches!(err, CoreError::EmptyPool));
    }

    #[test]
    fn explicit_destinations_exclude_evacuated_space() {
        let cfg = MoveConfig::builder([p("100.64.0.0/24")])
            .destinations([p("100.64.0.0/23")])
            .build()
            .unwrap();
        let pool: Vec<String> = cfg.pool().iter().map(ToString::to_string).collect();
        assert_eq!(pool, vec!["100.64.1.0/24"]);
    }

    #[test]
    fn destinations_inside_evacuation_are_an_empty_pool() {
        let err = MoveConfig::builder([p("100.64.0.0/16")])
            .destinations([p("100.64.3.0/24")])
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::EmptyPool));
    }

    #[test]
    fn empty_destination_list_means_parent_block() {
        let cfg = MoveConfig::builder([p("100.64.0.0/24")])
            .destinations(Vec::new())
            .build()
            .unwrap();
        assert!(cfg.destinations().is_none());
        assert!(cfg.pool().contains("100.127.0.1".parse().unwrap()));
    }

    #[test]
    fn policies_render_kebab_case() {
        assert_eq!(ErrorPolicy::Continue.to_string(), "continue");
        assert_eq!(CommitMode::DryRun.to_string(), "dry-run");
    }
}
