//! # Service Configuration
//!
//! Environment variables are read once at startup into [`AppConfig`].
//! The two store paths point at independently maintained database files:
//! the catalogue (normas, approvals, users, sessions) and the externally
//! produced classification dataset.

use std::time::Duration;

/// Session lifetime for issued bearer tokens.
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Runtime configuration for the API service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port to bind.
    pub port: u16,
    /// Path to the catalogue database file.
    pub normas_db_path: String,
    /// Path to the classification database file (read-only in production;
    /// populated by an external pipeline).
    pub classificacoes_db_path: String,
    /// Bootstrap admin credentials, applied only when no admin exists.
    pub admin_username: String,
    pub admin_password: String,
    pub admin_nome: String,
}

impl AppConfig {
    /// Read configuration from the environment. Every variable has a
    /// development fallback so a bare `cargo run` starts a usable local
    /// instance.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("NORMAS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5001),
            normas_db_path: std::env::var("NORMAS_DB_PATH")
                .unwrap_or_else(|_| "tb_normas_consolidadas.db".to_string()),
            classificacoes_db_path: std::env::var("CLASSIFICACOES_DB_PATH")
                .unwrap_or_else(|_| "management_systems_classifications.db".to_string()),
            admin_username: std::env::var("NORMAS_ADMIN_USERNAME")
                .unwrap_or_else(|_| "admin".to_string()),
            admin_password: std::env::var("NORMAS_ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin123".to_string()),
            admin_nome: std::env::var("NORMAS_ADMIN_NOME")
                .unwrap_or_else(|_| "Administrador".to_string()),
        }
    }
}

/// Check if metrics are enabled via the `NORMAS_METRICS_ENABLED` env var.
/// Defaults to `true` when the variable is absent or set to anything other
/// than `"false"`.
pub fn metrics_enabled() -> bool {
    std::env::var("NORMAS_METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}
