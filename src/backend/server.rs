use std::future::Future;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::auth::{Passwords, TokenSigner};
use super::db::ShopDb;
use crate::config::AppConfig;

/// Build the full application router with request tracing and, when
/// `cors_permissive` is set, a CORS layer that admits any origin.
pub fn build_router(state: SharedState, cors_permissive: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open the database and set up signing and hashing from `config`.
pub fn build_state(config: &AppConfig) -> Result<SharedState> {
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }
    let db = ShopDb::new(&config.database.path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database.path.display()
        )
    })?;

    let tokens = match config.auth.jwt_secret.as_deref() {
        Some(secret) => TokenSigner::new(secret.as_bytes(), config.auth.token_ttl_secs)?,
        None => {
            tracing::warn!("no JWT secret configured; issued tokens will not survive a restart");
            TokenSigner::ephemeral(config.auth.token_ttl_secs)?
        }
    };
    tracing::debug!(ttl_secs = tokens.ttl_secs(), "session tokens configured");
    let passwords = Passwords::new(config.auth.argon2_memory_kib, config.auth.argon2_iterations)?;

    Ok(AppState::new(db, tokens, passwords))
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn run<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Start the backend and block until Ctrl+C.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let state = build_state(&config)?;
    let app = build_router(state, config.server.cors_permissive);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        database = %config.database.path.display(),
        "shopping list API listening"
    );

    run(listener, app, shutdown_signal()).await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shut down by killing the process");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
