// ── API-to-domain conversions ──

use prefixmover_api::types::DeviceResponse;

use crate::model::{Device, DeviceId};

impl From<DeviceResponse> for Device {
    fn from(d: DeviceResponse) -> Self {
        Self {
            id: DeviceId::from(d.id),
            name: d.name,
            hostname: d.hostname,
            addresses: d.addresses,
            os: d.os,
            last_seen: d.last_seen,
        }
    }
}
