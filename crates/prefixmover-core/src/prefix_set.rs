// ── Prefix set arithmetic ──
//
// The builder keeps covered space as an ordered map of inclusive address
// ranges (start -> end). Ranges in the map never overlap and never touch:
// inserts coalesce with neighbours, removals split at the boundaries.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Subnets;
use serde::Serialize;

use crate::error::CoreError;
use crate::prefix::Prefix;

/// Accumulates add/remove operations over IPv4 space.
#[derive(Debug, Clone, Default)]
pub struct PrefixSetBuilder {
    ranges: BTreeMap<u32, u32>,
}

impl PrefixSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every address of `prefix` as covered.
    pub fn add(&mut self, prefix: Prefix) -> &mut Self {
        self.insert_range(prefix.first_bits(), prefix.last_bits());
        self
    }

    /// Exclude every address of `prefix`. Uncovered parts are ignored.
    pub fn remove(&mut self, prefix: Prefix) -> &mut Self {
        self.remove_range(prefix.first_bits(), prefix.last_bits());
        self
    }

    fn insert_range(&mut self, start: u32, end: u32) {
        let mut merged_start = start;
        let mut merged_end = end;

        // Anything ending at or after `start - 1` and starting at or before
        // `end + 1` either overlaps or is adjacent.
        let touch_lo = start.saturating_sub(1);
        let touch_hi = end.saturating_add(1);

        let mut absorbed: Vec<(u32, u32)> = self
            .ranges
            .range(..start)
            .next_back()
            .filter(|&(_, &e)| e >= touch_lo)
            .map(|(&s, &e)| (s, e))
            .into_iter()
            .collect();
        absorbed.extend(self.ranges.range(start..=touch_hi).map(|(&s, &e)| (s, e)));

        for (s, e) in absorbed {
            self.ranges.remove(&s);
            merged_start = merged_start.min(s);
            merged_end = merged_end.max(e);
        }

        self.ranges.insert(merged_start, merged_end);
    }

    fn remove_range(&mut self, start: u32, end: u32) {
        let mut overlapping: Vec<(u32, u32)> = self
            .ranges
            .range(..start)
            .next_back()
            .filter(|&(_, &e)| e >= start)
            .map(|(&s, &e)| (s, e))
            .into_iter()
            .collect();
        overlapping.extend(self.ranges.range(start..=end).map(|(&s, &e)| (s, e)));

        for (s, e) in overlapping {
            self.ranges.remove(&s);
            if s < start {
                self.ranges.insert(s, start - 1);
            }
            if e > end {
                self.ranges.insert(end + 1, e);
            }
        }
    }

    /// Normalize into the canonical, minimal prefix list.
    ///
    /// Each maximal range is tiled with the largest aligned blocks that fit,
    /// peeled from the start of the range.
    pub fn build(&self) -> Result<PrefixSet, CoreError> {
        let mut prefixes = Vec::new();
        let mut previous_end: Option<u32> = None;

        for (&start, &end) in &self.ranges {
            if start > end {
                return Err(CoreError::InconsistentPrefixSet {
                    message: format!(
                        "range {} - {} is inverted",
                        Ipv4Addr::from(start),
                        Ipv4Addr::from(end)
                    ),
                });
            }
            if let Some(prev) = previous_end {
                if prev.saturating_add(1) >= start {
                    return Err(CoreError::InconsistentPrefixSet {
                        message: format!(
                            "range starting at {} overlaps or touches its predecessor",
                            Ipv4Addr::from(start)
                        ),
                    });
                }
            }
            previous_end = Some(end);

            prefixes.extend(
                Ipv4Subnets::new(Ipv4Addr::from(start), Ipv4Addr::from(end), 0).map(Prefix::from),
            );
        }

        Ok(PrefixSet { prefixes })
    }
}

/// Sorted, disjoint, minimal list of prefixes.
///
/// No two members overlap and no two neighbours could be merged into a
/// single larger prefix. An empty set is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PrefixSet {
    prefixes: Vec<Prefix>,
}

impl PrefixSet {
    pub fn builder() -> PrefixSetBuilder {
        PrefixSetBuilder::new()
    }

    pub fn prefixes(&self) -> &[Prefix] {
        &self.prefixes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prefix> {
        self.prefixes.iter()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Total number of addresses covered by the set.
    pub fn host_count(&self) -> u64 {
        self.prefixes.iter().map(Prefix::host_count).sum()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let bits = u32::from(addr);
        // Members are sorted by network address; the only candidate is the
        // last one starting at or before `addr`.
        let idx = self.prefixes.partition_point(|p| p.first_bits() <= bits);
        idx.checked_sub(1)
            .and_then(|i| self.prefixes.get(i))
            .is_some_and(|p| p.contains(addr))
    }
}

impl<'a> IntoIterator for &'a PrefixSet {
    type Item = &'a Prefix;
    type IntoIter = std::slice::Iter<'a, Prefix>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for PrefixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, prefix) in self.prefixes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{prefix}")?;
        }
        write!(f, "]")
    }
}
