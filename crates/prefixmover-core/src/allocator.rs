// ── Per-device allocation protocol ──
//
// Sample, commit, and retry while the directory reports the candidate as
// held by another device. Any other commit error ends the device's turn.

use std::net::Ipv4Addr;
use std::num::NonZeroU32;

use rand::Rng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CommitMode;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::model::Device;
use crate::prefix_set::PrefixSet;
use crate::sampler::AddressSampler;

/// What happened to one candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    Committed,
    /// Accepted without contacting the directory (dry run).
    Previewed,
    AddressInUse,
    Failed,
}

/// One sample-and-commit try. Lives only for a single device's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationAttempt {
    /// 1-based attempt number.
    pub index: u32,
    pub candidate: Ipv4Addr,
    pub outcome: AttemptOutcome,
}

/// A successfully placed device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub address: Ipv4Addr,
    /// Every attempt made, the last one being the successful one.
    pub attempts: Vec<AllocationAttempt>,
}

/// Places devices on random free addresses from a candidate pool.
pub struct Allocator<'a, D, R = StdRng> {
    directory: &'a D,
    sampler: AddressSampler<R>,
    max_retries: NonZeroU32,
    commit_mode: CommitMode,
    cancel: CancellationToken,
}

impl<'a, D, R> Allocator<'a, D, R>
where
    D: Directory + Sync,
    R: Rng + Send,
{
    pub fn new(directory: &'a D, sampler: AddressSampler<R>, max_retries: NonZeroU32) -> Self {
        Self {
            directory,
            sampler,
            max_retries,
            commit_mode: CommitMode::Apply,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    /// Stop before the next attempt once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Move `device` to a random address drawn from `pool`.
    ///
    /// Makes at most `max_retries` attempts. Only
    /// [`CoreError::AddressInUse`] leads to another attempt; any other
    /// commit error is returned immediately. Running out of attempts yields
    /// [`CoreError::RetriesExhausted`].
    pub async fn assign(&mut self, device: &Device, pool: &PrefixSet) -> Result<Assignment, CoreError> {
        if pool.is_empty() {
            return Err(CoreError::EmptyPool);
        }

        let limit = self.max_retries.get();
        let mut attempts = Vec::new();

        for index in 1..=limit {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let prefix = *self
                .sampler
                .pick_prefix(pool.prefixes())
                .ok_or(CoreError::EmptyPool)?;
            let candidate = self.sampler.sample_host(&prefix);
            debug!(
                device = %device.id,
                attempt = index,
                %prefix,
                %candidate,
                "trying candidate address"
            );

            let committed = match self.commit_mode {
                CommitMode::DryRun => Ok(AttemptOutcome::Previewed),
                CommitMode::Apply => self
                    .directory
                    .set_device_address(&device.id, candidate)
                    .await
                    .map(|()| AttemptOutcome::Committed),
            };

            match committed {
                Ok(outcome) => {
                    attempts.push(AllocationAttempt {
                        index,
                        candidate,
                        outcome,
                    });
                    info!(
                        device = %device.id,
                        name = %device.name,
                        address = %candidate,
                        attempts = index,
                        "address {outcome}"
                    );
                    return Ok(Assignment {
                        address: candidate,
                        attempts,
                    });
                }
                Err(err) if err.is_address_in_use() => {
                    attempts.push(AllocationAttempt {
                        index,
                        candidate,
                        outcome: AttemptOutcome::AddressInUse,
                    });
                    warn!(
                        device = %device.id,
                        attempt = index,
                        %candidate,
                        "address already in use, retrying"
                    );
                }
                Err(err) => {
                    debug!(device = %device.id, attempt = index, %candidate, error = %err, "commit failed");
                    return Err(err);
                }
            }
        }

        Err(CoreError::RetriesExhausted { limit })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::model::DeviceId;
    use crate::prefix::Prefix;

    /// Scripted directory: pops one response per commit, then succeeds.
    #[derive(Default)]
    pub(crate) struct FakeDirectory {
        pub devices: Vec<Device>,
        pub list_error: Mutex<Option<CoreError>>,
        pub responses: Mutex<VecDeque<Result<(), CoreError>>>,
        pub always_in_use: bool,
        pub commits: Mutex<Vec<(DeviceId, Ipv4Addr)>>,
    }

    impl FakeDirectory {
        pub fn with_devices(devices: Vec<Device>) -> Self {
            Self {
                devices,
                ..Self::default()
            }
        }

        pub fn push_response(&self, response: Result<(), CoreError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub fn commits(&self) -> Vec<(DeviceId, Ipv4Addr)> {
            self.commits.lock().unwrap().clone()
        }
    }

    impl Directory for FakeDirectory {
        async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
            if let Some(err) = self.list_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(self.devices.clone())
        }

        async fn set_device_address(
            &self,
            device_id: &DeviceId,
            address: Ipv4Addr,
        ) -> Result<(), CoreError> {
            self.commits
                .lock()
                .unwrap()
                .push((device_id.clone(), address));
            if self.always_in_use {
                return Err(CoreError::AddressInUse {
                    address: Some(address),
                });
            }
            self.responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    pub(crate) fn device(id: &str, address: &str) -> Device {
        Device {
            id: DeviceId::new(id),
            name: format!("{id}.example.ts.net"),
            hostname: None,
            addresses: vec![address.to_owned()],
            os: None,
            last_seen: None,
        }
    }

    fn pool(prefixes: &[&str]) -> PrefixSet {
        let mut builder = PrefixSet::builder();
        for p in prefixes {
            builder.add(p.parse::<Prefix>().unwrap());
        }
        builder.build().unwrap()
    }

    fn retries(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_retries_when_always_in_use() {
        let dir = FakeDirectory {
            always_in_use: true,
            ..FakeDirectory::default()
        };
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(1), retries(1));

        let err = allocator
            .assign(&device("n1", "100.64.0.5"), &pool(&["100.65.0.0/16"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::RetriesExhausted { limit: 1 }));
        assert!(!err.is_address_in_use());
        assert_eq!(dir.commits().len(), 1);
    }

    #[tokio::test]
    async fn retries_in_use_then_succeeds() {
        let dir = FakeDirectory::default();
        dir.push_response(Err(CoreError::AddressInUse { address: None }));
        dir.push_response(Err(CoreError::AddressInUse { address: None }));
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(2), retries(5));

        let assignment = allocator
            .assign(&device("n1", "100.64.0.5"), &pool(&["100.65.0.0/16"]))
            .await
            .unwrap();

        let outcomes: Vec<AttemptOutcome> = assignment.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::AddressInUse,
                AttemptOutcome::AddressInUse,
                AttemptOutcome::Committed
            ]
        );
        let commits = dir.commits();
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[2].1, assignment.address);
    }

    #[tokio::test]
    async fn first_try_success_returns_committed_address() {
        let dir = FakeDirectory::default();
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(3), retries(5));

        // A /32 pool pins the candidate.
        let assignment = allocator
            .assign(&device("n1", "100.64.0.5"), &pool(&["100.65.3.10/32"]))
            .await
            .unwrap();

        assert_eq!(assignment.address, Ipv4Addr::new(100, 65, 3, 10));
        assert_eq!(assignment.attempts.len(), 1);
        assert_eq!(dir.commits(), vec![(DeviceId::new("n1"), Ipv4Addr::new(100, 65, 3, 10))]);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let dir = FakeDirectory::default();
        dir.push_response(Err(CoreError::Api {
            message: "forbidden".into(),
            status: Some(403),
        }));
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(4), retries(5));

        let err = allocator
            .assign(&device("n1", "100.64.0.5"), &pool(&["100.65.0.0/16"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Api { status: Some(403), .. }));
        assert_eq!(dir.commits().len(), 1);
    }

    #[tokio::test]
    async fn rate_limiting_is_not_retried() {
        let dir = FakeDirectory::default();
        dir.push_response(Err(CoreError::RateLimited { retry_after_secs: 30 }));
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(6), retries(5));

        let err = allocator
            .assign(&device("n1", "100.64.0.5"), &pool(&["100.65.0.0/16"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::RateLimited { retry_after_secs: 30 }));
        assert_eq!(dir.commits().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_never_calls_the_directory() {
        let dir = FakeDirectory {
            always_in_use: true,
            ..FakeDirectory::default()
        };
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(5), retries(1))
            .with_commit_mode(CommitMode::DryRun);
        let pool = pool(&["100.100.0.0/16"]);

        let assignment = allocator
            .assign(&device("n1", "100.64.0.5"), &pool)
            .await
            .unwrap();

        assert!(pool.contains(assignment.address));
        assert_eq!(assignment.attempts[0].outcome, AttemptOutcome::Previewed);
        assert!(dir.commits().is_empty());
    }

    #[tokio::test]
    async fn candidates_always_come_from_the_pool() {
        let dir = FakeDirectory {
            always_in_use: true,
            ..FakeDirectory::default()
        };
        let pool = pool(&["100.64.4.0/22", "100.90.0.0/15", "100.127.255.0/24"]);
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(6), retries(200));

        let _ = allocator.assign(&device("n1", "100.64.0.5"), &pool).await;

        let commits = dir.commits();
        assert_eq!(commits.len(), 200);
        assert!(commits.iter().all(|(_, addr)| pool.contains(*addr)));
    }

    #[tokio::test]
    async fn empty_pool_is_an_error_not_a_panic() {
        let dir = FakeDirectory::default();
        let mut allocator = Allocator::new(&dir, AddressSampler::seeded(7), retries(3));

        let err = allocator
            .assign(&device("n1", "100.64.0.5"), &PrefixSet::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::EmptyPool));
        assert!(dir.commits().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_committing() {
        let dir = FakeDirectory::default();
        let token = CancellationToken::new();
        token.cancel();
        let mut allocator =
            Allocator::new(&dir, AddressSampler::seeded(8), retries(3)).with_cancellation(token);

        let err = allocator
            .assign(&device("n1", "100.64.0.5"), &pool(&["100.65.0.0/16"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert!(dir.commits().is_empty());
    }
}
