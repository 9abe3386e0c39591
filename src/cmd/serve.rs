//! `shoplist serve` and `shoplist db`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shoplist::backend::db::ShopDb;
use shoplist::backend::server;
use shoplist::config::AppConfig;

use super::super::DbCommands;

/// Flags that take precedence over file and environment settings.
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub db_path: Option<PathBuf>,
    pub verbose: bool,
}

/// File, then environment.
fn effective_config(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(config_path)?;
    config.apply_env()?;
    Ok(config)
}

pub async fn cmd_serve(config_path: Option<&Path>, overrides: ServeOverrides) -> Result<()> {
    let mut config = effective_config(config_path)?;
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(path) = overrides.db_path {
        config.database.path = path;
    }
    if overrides.verbose && std::env::var_os("RUST_LOG").is_none() {
        config.logging.level = "shoplist=debug,tower_http=debug,info".to_string();
    }

    let _guard = shoplist::telemetry::init(&config.logging)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    server::start_server(config).await
}

pub fn cmd_db(config_path: Option<&Path>, command: DbCommands) -> Result<()> {
    match command {
        DbCommands::Init { path } => {
            let mut config = effective_config(config_path)?;
            if let Some(path) = path {
                config.database.path = path;
            }
            let db_path = &config.database.path;
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .context("Failed to create database directory")?;
                }
            }
            ShopDb::new(db_path)
                .with_context(|| format!("Failed to initialize database at {}", db_path.display()))?;
            println!("Database initialized at {}", db_path.display());
            Ok(())
        }
    }
}
