//! Configuration for the `prefixmover` CLI.
//!
//! A single TOML file, environment overrides, credential resolution
//! (env + keyring + plaintext), and translation to
//! `prefixmover_core::DirectoryConfig`. Command-line flags are layered on
//! top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use prefixmover_core::{DEFAULT_MAX_RETRIES, DirectoryConfig};

pub use prefixmover_core::DEFAULT_API_URL;

/// Keyring service all secrets are stored under.
pub const KEYRING_SERVICE: &str = "prefixmover";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no tailnet configured")]
    MissingTailnet,

    #[error("no API key configured for tailnet '{tailnet}'")]
    NoCredentials { tailnet: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Tailnet name (e.g. "example.com" or "-" for the key's default).
    pub tailnet: Option<String>,

    /// Control plane base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (plaintext -- prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Run defaults.
    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tailnet: None,
            api_url: default_api_url(),
            api_key: None,
            api_key_env: None,
            timeout: default_timeout(),
            defaults: Defaults::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Attempts per device before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Keep going after a device fails instead of abandoning its prefix.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            continue_on_error: false,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Config {
    /// Copy with the plaintext key masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".into()),
            ..self.clone()
        }
    }

    /// Render as TOML with the plaintext key masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "prefixmover", "prefixmover").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("prefixmover");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from defaults, a TOML file, and `PREFIXMOVER_*`
/// environment variables (nested keys use `__`, e.g.
/// `PREFIXMOVER_DEFAULTS__MAX_RETRIES`).
///
/// An explicit `path` must exist; the platform default may be absent.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(explicit) => {
            if !explicit.is_file() {
                return Err(ConfigError::NotFound {
                    path: explicit.to_path_buf(),
                });
            }
            explicit.to_path_buf()
        }
        None => config_path(),
    };

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("PREFIXMOVER_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(tailnet: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{tailnet}/api-key"))
}

/// Resolve an API key from the credential chain (no CLI flag step).
pub fn resolve_api_key(config: &Config, tailnet: &str) -> Result<SecretString, ConfigError> {
    resolve_api_key_with(config, tailnet, |name| std::env::var(name).ok())
}

fn resolve_api_key_with(
    config: &Config,
    tailnet: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. api_key_env → env var lookup
    if let Some(val) = config.api_key_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(tailnet) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = config.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        tailnet: tailnet.into(),
    })
}

/// Store an API key in the system keyring for `tailnet`.
pub fn store_api_key(tailnet: &str, key: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(tailnet)?.set_password(key.expose_secret())?;
    Ok(())
}

/// The configured tailnet, or an error if there is none.
pub fn require_tailnet(config: &Config) -> Result<&str, ConfigError> {
    config
        .tailnet
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingTailnet)
}

/// Build a `DirectoryConfig` from the config and an already-resolved key.
pub fn directory_config(
    config: &Config,
    api_key: SecretString,
) -> Result<DirectoryConfig, ConfigError> {
    let tailnet = require_tailnet(config)?.to_owned();

    let url: url::Url = config.api_url.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {}", config.api_url),
    })?;

    if config.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    Ok(DirectoryConfig {
        url,
        tailnet,
        api_key,
        timeout: Duration::from_secs(config.timeout),
    })
}
