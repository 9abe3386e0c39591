//! Configuration view and validation commands (`shoplist config`).

use std::path::Path;

use anyhow::Result;
use console::style;
use shoplist::config::{AppConfig, DEFAULT_CONFIG_FILE, generate_secret};

use super::super::ConfigCommands;

pub fn cmd_config(config_path: Option<&Path>, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let mut config = AppConfig::load_or_default(config_path)?;
            config.apply_env()?;
            if config.auth.jwt_secret.is_some() {
                config.auth.jwt_secret = Some("********".to_string());
            }
            println!("# effective configuration (file + environment)");
            print!("{}", config.to_toml()?);
        }
        Some(ConfigCommands::Validate) => {
            let mut config = AppConfig::load_or_default(config_path)?;
            config.apply_env()?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{} Configuration is valid", style("✓").green());
            } else {
                for warning in &warnings {
                    println!("{} {}", style("warning:").yellow().bold(), warning);
                }
            }
        }
        Some(ConfigCommands::Init { force }) => {
            let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            let mut config = AppConfig::default();
            config.auth.jwt_secret = Some(generate_secret());
            config.save(path)?;
            println!("{} Wrote {}", style("✓").green(), path.display());
        }
    }
    Ok(())
}
