//! Config subcommand handlers. None of these talk to a controller.

use sdnsh_config::validate_controller;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let text = toml::to_string_pretty(&cfg)
                .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))?;
            output::print_output(text.trim_end(), global.quiet);
        }

        ConfigCommand::Init { controller, name } => {
            validate_controller(&controller)?;
            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(
                name.clone(),
                Profile {
                    controller,
                    ..Profile::default()
                },
            );
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;
            output::print_output(
                &format!("Profile '{name}' written to {}", config::config_path().display()),
                global.quiet,
            );
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.active_profile_name(None);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();
            let lines: Vec<String> = names
                .into_iter()
                .map(|name| {
                    let marker = if *name == default { "*" } else { " " };
                    format!("{marker} {name}\t{}", cfg.profiles[name].controller)
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
        }
    }
    Ok(())
}
