// Hand-crafted async HTTP client for the Tailscale v2 device API.
//
// Base path: /api/v2/
// Auth: Bearer API key

use std::net::Ipv4Addr;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;
use crate::types::{DeviceList, DeviceResponse, ErrorResponse, SetIpv4Request};

/// Public Tailscale control plane.
pub const DEFAULT_BASE_URL: &str = "https://api.tailscale.com";

/// Message the directory returns when an address is held by another node.
const ADDRESS_IN_USE_MESSAGE: &str = "address already in use";

/// Fallback when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the device directory of a single tailnet.
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    tailnet: String,
}

impl DirectoryClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API key and transport config.
    ///
    /// Injects `Authorization: Bearer <key>` as a sensitive default header.
    pub fn from_api_key(
        base_url: &str,
        tailnet: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret())).map_err(|e| {
                Error::Authentication {
                    message: format!("invalid API key header value: {e}"),
                }
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let http = transport.build_client_with_headers(headers)?;
        Self::from_reqwest(base_url, tailnet, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, tailnet: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            tailnet: tailnet.to_owned(),
        })
    }

    /// Build the base URL ending in `/api/v2/`.
    ///
    /// Accepts both `https://host` and `https://host/api/v2`.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if url.cannot_be_a_base() {
            return Err(Error::ClientSetup(format!("not a usable base URL: {raw}")));
        }

        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/api/v2") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/v2/"));
        }

        Ok(url)
    }

    pub fn tailnet(&self) -> &str {
        &self.tailnet
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::ClientSetup(format!("not a usable base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, Error> {
        let url = self.url(segments)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn post_no_response<B: Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(segments)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        Self::handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Error::InvalidApiKey,
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Error::RateLimited { retry_after_secs };
            }
            _ => {}
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|err| err.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        if status == StatusCode::CONFLICT || is_address_in_use(&message) {
            Error::AddressInUse {
                status: status.as_u16(),
            }
        } else {
            Error::Api {
                status: status.as_u16(),
                message,
            }
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// List every device in the tailnet.
    ///
    /// The endpoint is not paginated; one call returns the full snapshot.
    pub async fn list_devices(&self) -> Result<Vec<DeviceResponse>, Error> {
        let list: DeviceList = self.get(&["tailnet", &self.tailnet, "devices"]).await?;
        Ok(list.devices)
    }

    /// Assign a new tailnet IPv4 address to a device.
    ///
    /// Fails with [`Error::AddressInUse`] when another node holds `address`.
    pub async fn set_device_ipv4(&self, device_id: &str, address: Ipv4Addr) -> Result<(), Error> {
        let ipv4 = address.to_string();
        self.post_no_response(&["device", device_id, "ip"], &SetIpv4Request { ipv4: &ipv4 })
            .await
    }
}

fn is_address_in_use(message: &str) -> bool {
    message
        .trim()
        .to_ascii_lowercase()
        .contains(ADDRESS_IN_USE_MESSAGE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_api_prefix() {
        let url = DirectoryClient::normalize_base_url(DEFAULT_BASE_URL).unwrap();
        assert_eq!(url.as_str(), "https://api.tailscale.com/api/v2/");
    }

    #[test]
    fn base_url_with_prefix_is_kept() {
        let url = DirectoryClient::normalize_base_url("http://localhost:8080/api/v2/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v2/");
    }

    #[test]
    fn in_use_message_matching_ignores_case() {
        assert!(is_address_in_use("Address already in use"));
        assert!(is_address_in_use("address already in use (500)"));
        assert!(!is_address_in_use("invalid address"));
    }
}
