// Wire types for the Tailscale v2 device endpoints.
//
// Only the fields the mover reads are modelled; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope returned by `GET /api/v2/tailnet/{tailnet}/devices`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<DeviceResponse>,
}

/// A single device as reported by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    /// Legacy numeric-string identifier; accepted by every device endpoint.
    pub id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    /// MagicDNS name, e.g. `laptop.example.ts.net`.
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Tailnet addresses. The first entry is the IPv4 address.
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `POST /api/v2/device/{id}/ip`.
#[derive(Debug, Clone, Serialize)]
pub struct SetIpv4Request<'a> {
    pub ipv4: &'a str,
}

/// Error body shape shared by all endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}
