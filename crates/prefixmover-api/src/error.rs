use thiserror::Error;

/// Top-level error type for the `prefixmover-api` crate.
///
/// Covers every failure mode of the directory API: authentication,
/// transport, structured API rejections, and response decoding.
/// `prefixmover-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// API key rejected (HTTP 401 / 403).
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The key could not be turned into a request header.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Building the underlying HTTP client failed.
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// Rate limited by the API. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Directory API ───────────────────────────────────────────────
    /// The requested address is already held by another device.
    ///
    /// The directory reports this as a plain error message (usually with
    /// HTTP 500); it is lifted into its own variant here so callers never
    /// compare error strings.
    #[error("Address already in use (HTTP {status})")]
    AddressInUse { status: u16 },

    /// Any other structured error from the API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the directory refused an address because another
    /// device already holds it.
    pub fn is_address_in_use(&self) -> bool {
        matches!(self, Self::AddressInUse { .. })
    }
}
