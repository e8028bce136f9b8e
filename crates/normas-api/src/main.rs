//! Service entrypoint: tracing, stores, admin bootstrap, axum server.

use anyhow::Context;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

use normas_api::auth::hash_password;
use normas_api::config::AppConfig;
use normas_api::state::AppState;
use normas_api::{app, db};
use normas_core::TipoUsuario;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let normas = db::init_normas_pool(&config.normas_db_path)
        .await
        .with_context(|| format!("opening catalogue store at {}", config.normas_db_path))?;
    let classificacoes = db::init_classificacoes_pool(&config.classificacoes_db_path)
        .await
        .with_context(|| {
            format!(
                "opening classification store at {}",
                config.classificacoes_db_path
            )
        })?;

    bootstrap_admin(&normas, &config).await?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, normas, classificacoes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}

/// Create the default admin account when no admin exists yet, so a fresh
/// deployment can be logged into. Credentials come from the environment.
async fn bootstrap_admin(pool: &SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    if db::usuarios::count_admins(pool).await? > 0 {
        return Ok(());
    }

    let password_hash =
        hash_password(&config.admin_password).map_err(|e| anyhow::anyhow!("{e}"))?;
    let id = db::usuarios::create(
        pool,
        &config.admin_username,
        &password_hash,
        &config.admin_nome,
        TipoUsuario::Admin,
        Utc::now(),
    )
    .await?;

    tracing::info!(id, username = %config.admin_username, "bootstrapped default admin");
    Ok(())
}
