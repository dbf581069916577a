//! Config subcommand handlers.

use locksync_config::{KEYRING_ENTRY, KEYRING_SERVICE};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Map an interactive I/O failure into `CliError`.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&super::config_file(global).display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = super::load(global)?;
            let rendered = cfg.to_redacted_toml().map_err(|source| CliError::Config {
                source,
                path: super::config_file(global).display().to_string(),
            })?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken => {
            let token = rpassword::prompt_password("Nuki Web API token: ").map_err(prompt_err)?;
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "access_token".into(),
                    reason: "token cannot be empty".into(),
                });
            }

            keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY)?.set_password(token)?;
            if !global.quiet {
                eprintln!("Access token stored in system keyring");
            }
            Ok(())
        }
    }
}
