use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use shoplist::client::http::DEFAULT_API_URL;

mod cmd;

#[derive(Parser)]
#[command(name = "shoplist")]
#[command(version, about = "Shared shopping lists with budgets")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to shoplist.toml (defaults to ./shoplist.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the API, including the /api prefix
    #[arg(long, global = true, env = "SHOPLIST_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Where the session token is kept between commands
    #[arg(long, global = true, env = "SHOPLIST_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to serve on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides config and HOST)
        #[arg(long)]
        host: Option<String>,

        /// Database path (overrides config and DATABASE_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Register, log in and out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage shopping lists
    Lists {
        #[command(subcommand)]
        command: ListsCommands,
    },
    /// Manage items on a list
    Items {
        #[command(subcommand)]
        command: ItemsCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum DbCommands {
    /// Create the database and its tables, then exit
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration (file + environment)
    Show,
    /// Check the configuration for problems
    Validate,
    /// Write a starter shoplist.toml with a fresh JWT secret
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum AuthCommands {
    /// Create an account and start a session
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "SHOPLIST_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Start a session
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "SHOPLIST_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
}

#[derive(Subcommand, Clone)]
pub enum ListsCommands {
    /// Lists you own or that are shared with you
    Ls,
    /// A list with its items and budget
    Show { id: String },
    /// Create a list
    Create {
        name: String,
        #[arg(short, long, default_value = "0")]
        budget: f64,
        /// Initial item as NAME[:QUANTITY[:PRICE]] (repeatable)
        #[arg(short, long = "item", value_parser = cmd::lists::parse_item_spec)]
        items: Vec<shoplist_common::NewItem>,
        /// User id to share with (repeatable)
        #[arg(long = "share")]
        shared_with: Vec<String>,
    },
    /// Rename a list or change its budget
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        budget: Option<f64>,
    },
    /// Delete a list you own
    Delete { id: String },
    /// Share a list you own with another user
    Share { id: String, email: String },
}

#[derive(Subcommand, Clone)]
pub enum ItemsCommands {
    /// Add an item to a list
    Add {
        list: String,
        name: String,
        #[arg(short, long, default_value = "1")]
        quantity: f64,
        #[arg(short, long, default_value = "0")]
        price: f64,
    },
    /// Change an item's name, quantity or price
    Update {
        list: String,
        item: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        quantity: Option<f64>,
        #[arg(short, long)]
        price: Option<f64>,
    },
    /// Mark an item as bought
    Purchase {
        list: String,
        item: String,
        /// Mark it as not bought instead
        #[arg(long)]
        undo: bool,
    },
    /// Remove an item from a list
    Remove { list: String, item: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve { .. }) {
        shoplist::telemetry::init_for_client(cli.verbose);
    }

    match &cli.command {
        Commands::Serve {
            port,
            host,
            db_path,
        } => {
            cmd::cmd_serve(
                cli.config.as_deref(),
                cmd::ServeOverrides {
                    port: *port,
                    host: host.clone(),
                    db_path: db_path.clone(),
                    verbose: cli.verbose,
                },
            )
            .await?;
        }
        Commands::Db { command } => cmd::cmd_db(cli.config.as_deref(), command.clone())?,
        Commands::Config { command } => cmd::cmd_config(cli.config.as_deref(), command.clone())?,
        Commands::Auth { command } => cmd::cmd_auth(&cmd::ClientContext::from_cli(&cli), command).await?,
        Commands::Lists { command } => {
            cmd::cmd_lists(&cmd::ClientContext::from_cli(&cli), command, cli.yes).await?
        }
        Commands::Items { command } => cmd::cmd_items(&cmd::ClientContext::from_cli(&cli), command).await?,
    }

    Ok(())
}
