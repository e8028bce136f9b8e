//! Shared application state handed to every handler.

use sqlx::SqlitePool;

use crate::config::AppConfig;

/// Application state: configuration plus one pool per store.
///
/// The catalogue store and the classification store are independent database
/// files populated by independent pipelines; there is no cross-store
/// transaction. Each handler acquires connections from these pools for the
/// duration of one request only — no cross-request transaction state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Catalogue store: normas, approval ledger, users, sessions.
    pub normas: SqlitePool,
    /// Classification store: externally maintained, read-only here except
    /// for the reconciliation job's read path.
    pub classificacoes: SqlitePool,
}

impl AppState {
    pub fn new(config: AppConfig, normas: SqlitePool, classificacoes: SqlitePool) -> Self {
        Self {
            config,
            normas,
            classificacoes,
        }
    }
}
