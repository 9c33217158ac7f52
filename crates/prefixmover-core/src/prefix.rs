// ── Masked IPv4 prefixes ──

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A contiguous, power-of-two-aligned IPv4 range.
///
/// Always stored masked: host bits beyond `len` are zero. Parsing
/// `100.64.0.5/24` therefore yields `100.64.0.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix {
    network: u32,
    len: u8,
}

impl Prefix {
    /// The carrier-grade NAT block tailnet addresses are drawn from.
    pub const CGNAT: Prefix = Prefix {
        network: 0x6440_0000,
        len: 10,
    };

    /// Build a prefix, masking away host bits of `addr`.
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self, CoreError> {
        if len > 32 {
            return Err(CoreError::InvalidPrefix {
                input: format!("{addr}/{len}"),
                reason: "prefix length must be at most 32".into(),
            });
        }
        Ok(Self {
            network: u32::from(addr) & mask(len),
            len,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u8 {
        self.len
    }

    /// First address of the range (the network address).
    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    /// Last address of the range (the broadcast address).
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.last_bits())
    }

    /// Number of addresses covered, `2^(32 - len)`.
    pub fn host_count(&self) -> u64 {
        1_u64 << (32 - u32::from(self.len))
    }

    /// Mask of the host bits, e.g. `0x0000_00ff` for a /24.
    pub fn host_mask(&self) -> u32 {
        !mask(self.len)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.len) == self.network
    }

    /// `true` when `other` lies entirely inside `self`.
    pub fn contains_prefix(&self, other: &Prefix) -> bool {
        other.len >= self.len && self.contains(other.network())
    }

    pub fn overlaps(&self, other: &Prefix) -> bool {
        self.contains_prefix(other) || other.contains_prefix(self)
    }

    pub(crate) fn first_bits(&self) -> u32 {
        self.network
    }

    pub(crate) fn last_bits(&self) -> u32 {
        self.network | self.host_mask()
    }
}

/// Network mask for a prefix length; `len` must be `<= 32`.
fn mask(len: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0)
}

impl From<Ipv4Net> for Prefix {
    fn from(net: Ipv4Net) -> Self {
        let net = net.trunc();
        Self {
            network: u32::from(net.network()),
            len: net.prefix_len(),
        }
    }
}

impl FromStr for Prefix {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<Ipv4Net>()
            .map(Self::from)
            .map_err(|e| CoreError::InvalidPrefix {
                input: trimmed.to_owned(),
                reason: e.to_string(),
            })
    }
}

impl TryFrom<String> for Prefix {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.to_string()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn cgnat_constant_matches_parsed_block() {
        assert_eq!(Prefix::CGNAT, p("100.64.0.0/10"));
        assert_eq!(Prefix::CGNAT.last(), Ipv4Addr::new(100, 127, 255, 255));
        assert_eq!(Prefix::CGNAT.host_count(), 1 << 22);
    }

    #[test]
    fn parsing_masks_host_bits() {
        let prefix = p("100.64.0.5/24");
        assert_eq!(prefix.network(), Ipv4Addr::new(100, 64, 0, 0));
        assert_eq!(prefix.to_string(), "100.64.0.0/24");
    }

    #[test]
    fn parsing_rejects_garbage() {
        assert!("100.64.0.0".parse::<Prefix>().is_err());
        assert!("100.64.0.0/33".parse::<Prefix>().is_err());
        assert!("fd7a::/48".parse::<Prefix>().is_err());
        assert!("not-a-prefix".parse::<Prefix>().is_err());
    }

    #[test]
    fn new_rejects_long_length() {
        assert!(Prefix::new(Ipv4Addr::new(100, 64, 0, 0), 33).is_err());
    }

    #[test]
    fn bounds_at_extremes() {
        let all = p("0.0.0.0/0");
        assert_eq!(all.first(), Ipv4Addr::UNSPECIFIED);
        assert_eq!(all.last(), Ipv4Addr::BROADCAST);
        assert_eq!(all.host_count(), 1 << 32);

        let host = p("100.64.1.1/32");
        assert_eq!(host.first(), host.last());
        assert_eq!(host.host_count(), 1);
        assert_eq!(host.host_mask(), 0);
    }

    #[test]
    fn containment() {
        let block = p("100.64.0.0/24");
        assert!(block.contains(Ipv4Addr::new(100, 64, 0, 5)));
        assert!(block.contains(Ipv4Addr::new(100, 64, 0, 255)));
        assert!(!block.contains(Ipv4Addr::new(100, 64, 1, 0)));

        assert!(Prefix::CGNAT.contains_prefix(&block));
        assert!(!block.contains_prefix(&Prefix::CGNAT));
        assert!(block.overlaps(&Prefix::CGNAT));
        assert!(!block.overlaps(&p("100.64.1.0/24")));
    }

    #[test]
    fn serde_uses_cidr_strings() {
        let json = serde_json::to_string(&p("100.100.0.0/16")).unwrap();
        assert_eq!(json, "\"100.100.0.0/16\"");

        let back: Prefix = serde_json::from_str("\"100.100.7.0/16\"").unwrap();
        assert_eq!(back, p("100.100.0.0/16"));
    }
}
