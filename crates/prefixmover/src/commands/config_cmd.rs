//! Config subcommand handlers.

use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Map an interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let toml = cfg.to_redacted_toml()?;
            let out = output::render_single(
                global.output,
                &cfg.redacted(),
                |_| toml.trim_end().to_owned(),
                |_| toml.trim_end().to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetKey => {
            let cfg = config::load(global)?;
            let tailnet = prefixmover_config::require_tailnet(&cfg)?;

            let key = rpassword::prompt_password(format!("API key for {tailnet}: "))
                .map_err(prompt_err)?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "api key".into(),
                    reason: "cannot be empty".into(),
                });
            }

            prefixmover_config::store_api_key(tailnet, &SecretString::from(key.to_owned()))?;
            output::print_output(
                &format!("Stored API key for tailnet '{tailnet}' in the system keyring"),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
    }
}
