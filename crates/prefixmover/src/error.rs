//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use prefixmover_config::ConfigError;
use prefixmover_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the Tailscale API at {url}")]
    #[diagnostic(
        code(prefixmover::connection_failed),
        help(
            "Check network access to the control plane.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(prefixmover::timeout),
        help("Increase the timeout with --timeout or `timeout` in the config file.")
    )]
    Timeout,

    #[error("Rate limited by the Tailscale API")]
    #[diagnostic(
        code(prefixmover::rate_limited),
        help("Retry after {retry_after_secs}s.")
    )]
    RateLimited { retry_after_secs: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(prefixmover::auth_failed),
        help(
            "Verify the API key has device write access.\n\
             Run: prefixmover config set-key"
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured for tailnet '{tailnet}'")]
    #[diagnostic(
        code(prefixmover::no_credentials),
        help(
            "Set TAILSCALE_API_KEY, pass --api-key, or store one with:\n\
             prefixmover config set-key"
        )
    )]
    NoCredentials { tailnet: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(prefixmover::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid prefix '{input}': {reason}")]
    #[diagnostic(
        code(prefixmover::invalid_prefix),
        help("Prefixes are IPv4 CIDR blocks, e.g. 100.64.0.0/24.")
    )]
    InvalidPrefix { input: String, reason: String },

    #[error("Prefix {prefix} is outside {parent}")]
    #[diagnostic(
        code(prefixmover::outside_parent),
        help("Only addresses inside the tailnet block {parent} can be moved.")
    )]
    PrefixOutsideParent { prefix: String, parent: String },

    #[error("No addresses left to move devices to")]
    #[diagnostic(
        code(prefixmover::empty_pool),
        help("The evacuated prefixes cover every destination. Check --prefixes and --to.")
    )]
    EmptyPool,

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(prefixmover::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No tailnet configured")]
    #[diagnostic(
        code(prefixmover::no_tailnet),
        help("Set TAILSCALE_TAILNET, pass --tailnet, or add `tailnet` to the config file.")
    )]
    MissingTailnet,

    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(prefixmover::no_config))]
    ConfigNotFound { path: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(prefixmover::config))]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(prefixmover::keyring),
        help("Use TAILSCALE_API_KEY or `api_key_env` in the config file instead.")
    )]
    Keyring { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(prefixmover::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Run results ──────────────────────────────────────────────────
    #[error("{failures} device(s) could not be moved")]
    #[diagnostic(
        code(prefixmover::run_failed),
        help("Rerun with the same prefixes to retry the remaining devices.")
    )]
    RunFailed { failures: usize },

    #[error("Interrupted")]
    #[diagnostic(
        code(prefixmover::interrupted),
        help("{failures} device(s) had failed before the interrupt.")
    )]
    Interrupted { failures: usize },

    // ── IO / Internal ────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(prefixmover::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(prefixmover::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(prefixmover::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::InvalidPrefix { .. }
            | Self::PrefixOutsideParent { .. }
            | Self::EmptyPool
            | Self::Validation { .. }
            | Self::MissingTailnet
            | Self::ConfigNotFound { .. }
            | Self::Config { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Interrupted { .. } => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidPrefix { input, reason } => CliError::InvalidPrefix { input, reason },

            CoreError::PrefixOutsideParent { prefix, parent } => CliError::PrefixOutsideParent {
                prefix: prefix.to_string(),
                parent: parent.to_string(),
            },

            CoreError::EmptyPool => CliError::EmptyPool,

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout => CliError::Timeout,

            CoreError::RateLimited { retry_after_secs } => {
                CliError::RateLimited { retry_after_secs }
            }

            CoreError::Cancelled => CliError::Interrupted { failures: 0 },

            err @ (CoreError::Api { .. }
            | CoreError::AddressInUse { .. }
            | CoreError::RetriesExhausted { .. }) => CliError::Api {
                message: err.to_string(),
            },

            err @ (CoreError::InconsistentPrefixSet { .. } | CoreError::Internal(_)) => {
                CliError::Internal(err.to_string())
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::MissingTailnet => CliError::MissingTailnet,
            ConfigError::NoCredentials { tailnet } => CliError::NoCredentials { tailnet },
            ConfigError::NotFound { path } => CliError::ConfigNotFound {
                path: path.display().to_string(),
            },
            ConfigError::Figment(e) => CliError::Config {
                message: e.to_string(),
            },
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use prefixmover_core::Prefix;

    use super::*;

    #[test]
    fn config_problems_are_usage_errors() {
        let err = CliError::from(CoreError::PrefixOutsideParent {
            prefix: "10.0.0.0/8".parse::<Prefix>().unwrap_or(Prefix::CGNAT),
            parent: Prefix::CGNAT,
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(CliError::from(CoreError::EmptyPool).exit_code(), exit_code::USAGE);
        assert_eq!(
            CliError::from(ConfigError::MissingTailnet).exit_code(),
            exit_code::USAGE
        );
    }

    #[test]
    fn transport_problems_have_their_own_codes() {
        assert_eq!(CliError::from(CoreError::Timeout).exit_code(), exit_code::TIMEOUT);
        assert_eq!(
            CliError::from(CoreError::AuthenticationFailed {
                message: "bad".into()
            })
            .exit_code(),
            exit_code::AUTH
        );
        assert_eq!(
            CliError::from(CoreError::ConnectionFailed {
                url: "http://x".into(),
                reason: "refused".into()
            })
            .exit_code(),
            exit_code::CONNECTION
        );
    }

    #[test]
    fn run_outcomes_map_to_exit_codes() {
        assert_eq!(CliError::RunFailed { failures: 2 }.exit_code(), exit_code::GENERAL);
        assert_eq!(
            CliError::from(CoreError::Cancelled).exit_code(),
            exit_code::INTERRUPTED
        );
    }
}
