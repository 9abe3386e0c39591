//! CLI command implementations.
//!
//! | Module   | Commands handled                       |
//! |----------|----------------------------------------|
//! | `serve`  | `Serve`, `Db`                          |
//! | `config` | `Config`                               |
//! | `auth`   | `Auth`                                 |
//! | `lists`  | `Lists`                                |
//! | `items`  | `Items`                                |
//!
//! Client commands talk to a running server through [`ClientContext`]; only
//! `serve`, `db` and `config` touch local files.

use std::path::PathBuf;

use anyhow::Result;
use shoplist::client::{ApiClient, AuthStore, ListStore, TokenStore};
use shoplist::errors::ClientError;

use super::Cli;

pub mod auth;
pub mod config;
pub mod items;
pub mod lists;
pub mod serve;

pub use auth::cmd_auth;
pub use config::cmd_config;
pub use items::cmd_items;
pub use lists::cmd_lists;
pub use serve::{ServeOverrides, cmd_db, cmd_serve};

/// Where the API lives and where the session token is kept.
pub struct ClientContext {
    pub api_url: String,
    pub token_file: PathBuf,
}

impl ClientContext {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            api_url: cli.api_url.clone(),
            token_file: cli
                .token_file
                .clone()
                .unwrap_or_else(TokenStore::default_path),
        }
    }

    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(&self.token_file)
    }

    pub fn auth_store(&self) -> Result<AuthStore> {
        Ok(AuthStore::new(ApiClient::new(&self.api_url), self.tokens())?)
    }

    /// A list store whose client carries the saved session token.
    pub fn list_store(&self) -> Result<ListStore> {
        let token = self.tokens().load()?;
        Ok(ListStore::new(ApiClient::new(&self.api_url).with_token(token)))
    }
}

/// Turn a failed store operation into the message the store recorded.
pub fn settled<T>(store: &ListStore, result: Result<T, ClientError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(ClientError::NotLoggedIn) => Err(ClientError::NotLoggedIn.into()),
        Err(e @ ClientError::Transport(_)) => Err(anyhow::Error::new(e).context(format!(
            "Could not reach the API at {}",
            store.client().base_url()
        ))),
        Err(e) if e.status() == Some(401) => {
            let message = e.server_message().unwrap_or("Session rejected");
            anyhow::bail!("{}. Run `shoplist auth login` again.", message)
        }
        Err(e) => {
            let message = store
                .state()
                .error
                .clone()
                .unwrap_or_else(|| e.to_string());
            anyhow::bail!(message)
        }
    }
}

/// Two decimals, as prices are shown everywhere.
pub fn money(amount: f64) -> String {
    format!("${:.2}", amount)
}
