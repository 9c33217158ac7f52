// ── Random address sampling ──

use std::net::Ipv4Addr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::prefix::Prefix;

/// Draws random candidate addresses.
///
/// Sampling is two-stage: a prefix is picked uniformly from the pool, then
/// a host uniformly inside it. Small prefixes are therefore over-represented
/// relative to a pool-wide uniform draw.
#[derive(Debug, Clone)]
pub struct AddressSampler<R = StdRng> {
    rng: R,
}

impl AddressSampler<StdRng> {
    /// Sampler seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic sampler for reproducible previews and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> AddressSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Uniformly random address inside `prefix`, network and broadcast
    /// addresses included.
    pub fn sample_host(&mut self, prefix: &Prefix) -> Ipv4Addr {
        sample_host(prefix, &mut self.rng)
    }

    /// Uniformly random member of `pool`, or `None` when it is empty.
    pub fn pick_prefix<'p>(&mut self, pool: &'p [Prefix]) -> Option<&'p Prefix> {
        pool.choose(&mut self.rng)
    }
}

/// Uniformly random address inside `prefix` using `rng`.
pub fn sample_host<R: Rng + ?Sized>(prefix: &Prefix, rng: &mut R) -> Ipv4Addr {
    let host_mask = prefix.host_mask();
    let offset = if host_mask == 0 {
        0
    } else {
        rng.gen_range(0..=host_mask)
    };
    Ipv4Addr::from(u32::from(prefix.network()) | offset)
}
