//! Session commands (`shoplist auth`).

use anyhow::{Context, Result};
use console::style;
use shoplist_common::payloads::check;
use shoplist_common::{Credentials, Registration, ValidationReport};

use super::super::AuthCommands;
use super::ClientContext;

pub async fn cmd_auth(ctx: &ClientContext, command: &AuthCommands) -> Result<()> {
    let mut store = ctx.auth_store()?;

    match command {
        AuthCommands::Register {
            name,
            email,
            password,
        } => {
            let registration = Registration {
                name: name.clone(),
                email: email.clone(),
                password: password_or_prompt(password.as_deref())?,
            };
            check(&registration).map_err(|report| invalid(&report))?;
            store.register(&registration).await?;
            let state = store.state();
            match &state.user {
                Some(user) if state.is_authenticated => {
                    println!("{} Registered as {} <{}>", style("✓").green(), user.name, user.email);
                }
                _ => anyhow::bail!("{}", state.error.as_deref().unwrap_or_default()),
            }
        }
        AuthCommands::Login { email, password } => {
            let credentials = Credentials {
                email: email.clone(),
                password: password_or_prompt(password.as_deref())?,
            };
            check(&credentials).map_err(|report| invalid(&report))?;
            store.login(&credentials).await?;
            let state = store.state();
            match &state.user {
                Some(user) if state.is_authenticated => {
                    println!("{} Logged in as {} <{}>", style("✓").green(), user.name, user.email);
                }
                _ => anyhow::bail!("{}", state.error.as_deref().unwrap_or_default()),
            }
        }
        AuthCommands::Logout => {
            store.logout()?;
            println!("Logged out");
        }
        AuthCommands::Whoami => {
            if store.state().token.is_none() {
                anyhow::bail!(shoplist::errors::ClientError::NotLoggedIn);
            }
            store
                .load_user()
                .await
                .with_context(|| format!("Could not reach the API at {}", store.client().base_url()))?;
            match &store.state().user {
                Some(user) => {
                    println!("{} <{}>", user.name, user.email);
                    println!("id: {}", user.id);
                }
                None => anyhow::bail!("Session expired. Run `shoplist auth login` again."),
            }
        }
    }
    Ok(())
}

fn password_or_prompt(given: Option<&str>) -> Result<String> {
    match given {
        Some(password) => Ok(password.to_string()),
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password"),
    }
}

/// One line per failed field.
fn invalid(report: &ValidationReport) -> anyhow::Error {
    let lines: Vec<String> = report
        .0
        .iter()
        .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
        .collect();
    anyhow::anyhow!(lines.join("\n"))
}
