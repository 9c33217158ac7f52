// ── Core error types ──
//
// Domain errors from prefixmover-core. Consumers never see HTTP status
// handling or JSON decoding directly; the `From<prefixmover_api::Error>`
// impl translates transport-layer errors into these variants.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::prefix::Prefix;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid prefix '{input}': {reason}")]
    InvalidPrefix { input: String, reason: String },

    #[error("Prefix {prefix} is outside the parent block {parent}")]
    PrefixOutsideParent { prefix: Prefix, parent: Prefix },

    #[error("No destination addresses left: the candidate pool is empty")]
    EmptyPool,

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Directory errors ─────────────────────────────────────────────
    #[error("Cannot reach the device directory at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device directory request timed out")]
    Timeout,

    #[error("Rate limited by the device directory -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Allocation errors ────────────────────────────────────────────
    /// The directory refused the address because another device holds it.
    /// The only error the allocator retries on.
    #[error(
        "Address{} already in use",
        .address.map(|a| format!(" {a}")).unwrap_or_default()
    )]
    AddressInUse { address: Option<Ipv4Addr> },

    #[error("Unable to set a new address after {limit} tries")]
    RetriesExhausted { limit: u32 },

    #[error("Run cancelled")]
    Cancelled,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Prefix set is inconsistent: {message}")]
    InconsistentPrefixSet { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for the retryable "address already in use" condition.
    pub fn is_address_in_use(&self) -> bool {
        matches!(self, Self::AddressInUse { .. })
    }

    /// Returns `true` if the error was caused by invalid configuration and
    /// was raised before any device was touched.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrefix { .. }
                | Self::PrefixOutsideParent { .. }
                | Self::EmptyPool
                | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<prefixmover_api::Error> for CoreError {
    fn from(err: prefixmover_api::Error) -> Self {
        match err {
            prefixmover_api::Error::InvalidApiKey => CoreError::AuthenticationFailed {
                message: "Invalid API key".into(),
            },
            prefixmover_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            prefixmover_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            prefixmover_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            prefixmover_api::Error::ClientSetup(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            prefixmover_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            prefixmover_api::Error::AddressInUse { .. } => CoreError::AddressInUse { address: None },
            prefixmover_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            prefixmover_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
