//! CLI configuration -- thin wrapper around `prefixmover_config`.
//!
//! Loads the shared config and layers `GlobalOpts` flag overrides
//! (--tailnet, --api-key, --api-url, --timeout) on top.

use secrecy::SecretString;

use prefixmover_core::{CommitMode, DirectoryConfig, ErrorPolicy, MoveConfig, Prefix};

use crate::cli::{EvacuateArgs, GlobalOpts};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use prefixmover_config::{Config, config_path};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Load config (file + env) and apply command-line overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = prefixmover_config::load_config(global.config.as_deref())?;

    if let Some(ref tailnet) = global.tailnet {
        cfg.tailnet = Some(tailnet.clone());
    }
    if let Some(ref url) = global.api_url {
        cfg.api_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }

    Ok(cfg)
}

/// Translate config + global flags into a `DirectoryConfig`.
///
/// `--api-key` / `TAILSCALE_API_KEY` take priority over the config chain.
pub fn directory_config(cfg: &Config, global: &GlobalOpts) -> Result<DirectoryConfig, CliError> {
    let tailnet = prefixmover_config::require_tailnet(cfg)?;

    let api_key = match global.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => SecretString::from(key.to_owned()),
        _ => prefixmover_config::resolve_api_key(cfg, tailnet)?,
    };

    Ok(prefixmover_config::directory_config(cfg, api_key)?)
}

/// Parse CIDR strings given on the command line.
pub fn parse_prefixes(values: &[String]) -> Result<Vec<Prefix>, CliError> {
    values
        .iter()
        .map(String::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<Prefix>().map_err(CliError::from))
        .collect()
}

/// Evacuation prefixes for read-only views. They must sit inside the
/// tailnet block, but no destination pool is needed.
pub fn evacuation_prefixes(values: &[String]) -> Result<Vec<Prefix>, CliError> {
    let prefixes = parse_prefixes(values)?;
    if prefixes.is_empty() {
        return Err(CliError::Validation {
            field: "prefixes".into(),
            reason: "at least one prefix to evacuate is required".into(),
        });
    }
    if let Some(outside) = prefixes.iter().find(|p| !Prefix::CGNAT.contains_prefix(p)) {
        return Err(CliError::PrefixOutsideParent {
            prefix: outside.to_string(),
            parent: Prefix::CGNAT.to_string(),
        });
    }
    Ok(prefixes)
}

/// Validated run configuration for `evacuate`. Flags override `[defaults]`.
pub fn move_config(cfg: &Config, args: &EvacuateArgs) -> Result<MoveConfig, CliError> {
    let evacuate = parse_prefixes(&args.prefixes.prefixes)?;
    let destinations = parse_prefixes(&args.destinations.to)?;

    let policy = if args.continue_on_error || cfg.defaults.continue_on_error {
        ErrorPolicy::Continue
    } else {
        ErrorPolicy::Stop
    };
    let mode = if args.dry_run {
        CommitMode::DryRun
    } else {
        CommitMode::Apply
    };

    Ok(MoveConfig::builder(evacuate)
        .destinations(destinations)
        .max_retries(args.max_retries.unwrap_or(cfg.defaults.max_retries))
        .error_policy(policy)
        .commit_mode(mode)
        .build()?)
}

/// Run configuration for the offline `pool` view.
pub fn selection_config(prefixes: &[String], to: &[String]) -> Result<MoveConfig, CliError> {
    Ok(MoveConfig::builder(parse_prefixes(prefixes)?)
        .destinations(parse_prefixes(to)?)
        .build()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn whole_block_is_a_valid_selection() {
        let prefixes = evacuation_prefixes(&strings(&["100.64.0.0/10"])).unwrap();
        assert_eq!(prefixes, vec![Prefix::CGNAT]);
    }

    #[test]
    fn whole_block_leaves_no_pool() {
        let err = selection_config(&strings(&["100.64.0.0/10"]), &[]).unwrap_err();
        assert!(matches!(err, CliError::EmptyPool));
    }

    #[test]
    fn selection_outside_the_block_is_rejected() {
        let err = evacuation_prefixes(&strings(&["10.0.0.0/8"])).unwrap_err();
        assert!(matches!(err, CliError::PrefixOutsideParent { .. }));
    }

    #[test]
    fn blank_selection_is_rejected() {
        let err = evacuation_prefixes(&strings(&[" "])).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }
}
