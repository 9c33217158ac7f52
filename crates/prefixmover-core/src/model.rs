// ── Device domain types ──

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque directory identifier of a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A tailnet device as seen in one directory snapshot.
///
/// The directory stays the source of truth; this is a read-only copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub hostname: Option<String>,
    /// Raw address strings as reported; the first entry is the primary
    /// IPv4 address.
    pub addresses: Vec<String>,
    pub os: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    /// The primary IPv4 address: the first address entry, if it parses as
    /// IPv4.
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.addresses.first()?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(addresses: &[&str]) -> Device {
        Device {
            id: DeviceId::new("1"),
            name: "laptop".into(),
            hostname: None,
            addresses: addresses.iter().map(|a| (*a).to_owned()).collect(),
            os: None,
            last_seen: None,
        }
    }

    #[test]
    fn primary_is_first_entry() {
        let d = device(&["100.64.0.5", "fd7a:115c:a1e0::5"]);
        assert_eq!(d.primary_ipv4(), Some(Ipv4Addr::new(100, 64, 0, 5)));
    }

    #[test]
    fn no_primary_when_first_entry_is_not_ipv4() {
        assert_eq!(device(&["fd7a:115c:a1e0::5", "100.64.0.5"]).primary_ipv4(), None);
        assert_eq!(device(&[]).primary_ipv4(), None);
        assert_eq!(device(&["garbage"]).primary_ipv4(), None);
    }
}
