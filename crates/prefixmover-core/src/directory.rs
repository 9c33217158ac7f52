// ── Device directory seam ──

use std::future::Future;
use std::net::Ipv4Addr;

use prefixmover_api::{DirectoryClient, TransportConfig};
use tracing::debug;

use crate::config::DirectoryConfig;
use crate::error::CoreError;
use crate::model::{Device, DeviceId};

/// The two directory operations the mover needs.
///
/// `set_device_address` must report a held address as
/// [`CoreError::AddressInUse`]; every other error is treated as fatal for
/// the device.
pub trait Directory {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Device>, CoreError>> + Send;

    fn set_device_address(
        &self,
        device_id: &DeviceId,
        address: Ipv4Addr,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl Directory for DirectoryClient {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let devices = DirectoryClient::list_devices(self).await?;
        debug!(count = devices.len(), tailnet = self.tailnet(), "listed devices");
        Ok(devices.into_iter().map(Device::from).collect())
    }

    async fn set_device_address(
        &self,
        device_id: &DeviceId,
        address: Ipv4Addr,
    ) -> Result<(), CoreError> {
        self.set_device_ipv4(device_id.as_str(), address)
            .await
            .map_err(|err| {
                if err.is_address_in_use() {
                    CoreError::AddressInUse {
                        address: Some(address),
                    }
                } else {
                    CoreError::from(err)
                }
            })
    }
}

/// Build an authenticated directory client.
pub fn connect(config: &DirectoryConfig) -> Result<DirectoryClient, CoreError> {
    let transport = TransportConfig::default().with_timeout(config.timeout);
    let client = DirectoryClient::from_api_key(
        config.url.as_str(),
        &config.tailnet,
        &config.api_key,
        &transport,
    )?;
    Ok(client)
}
