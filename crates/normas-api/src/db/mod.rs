//! # Database Persistence Layer
//!
//! SQLite persistence via SQLx, one database file per store:
//!
//! - **Catalogue store** (`tb_normas_consolidadas`, `tb_normas_aprovacoes`,
//!   `tb_usuarios`, `tb_sessoes`) — owned by this service.
//! - **Classification store** (`management_systems_classifications`) —
//!   populated by an external classification pipeline; this service only
//!   reads it. The schema is still created when absent so a fresh
//!   development environment starts clean.
//!
//! There are no foreign keys between the two files and none between
//! `tb_normas_aprovacoes.norma_id` and the normas table: approval history
//! deliberately survives norma deletion.
//!
//! Every function in the submodules takes a `&SqlitePool` — stores are
//! injected, never reached through module-level globals.

pub mod aprovacoes;
pub mod classificacoes;
pub mod normas;
pub mod usuarios;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const NORMAS_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tb_normas_consolidadas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        numero_norma TEXT NOT NULL,
        tipo_norma TEXT NOT NULL,
        orgao_emissor TEXT NOT NULL,
        titulo_da_norma TEXT NOT NULL,
        ementa TEXT,
        data_publicacao TEXT,
        divisao_politica TEXT,
        origem_dado TEXT NOT NULL DEFAULT 'SITE',
        origem_publicacao TEXT,
        status_vigencia TEXT,
        lake_ingestao TEXT,
        aplicavel BOOLEAN NOT NULL DEFAULT 0,
        atualizado_em TEXT
    )",
    "CREATE TABLE IF NOT EXISTS tb_normas_aprovacoes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        norma_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        solicitante TEXT NOT NULL,
        data_registro TEXT NOT NULL,
        observacao TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_aprovacoes_norma
        ON tb_normas_aprovacoes (norma_id, data_registro DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS tb_usuarios (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        nome_completo TEXT NOT NULL,
        tipo_usuario TEXT NOT NULL CHECK (tipo_usuario IN ('admin', 'user')),
        ativo BOOLEAN NOT NULL DEFAULT 1,
        data_criacao TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tb_sessoes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        usuario_id INTEGER NOT NULL,
        token_hash TEXT NOT NULL UNIQUE,
        criado_em TEXT NOT NULL,
        expira_em TEXT NOT NULL
    )",
];

const CLASSIFICACOES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS management_systems_classifications (
        norm_id INTEGER NOT NULL,
        mngm_sys TEXT,
        classification BOOLEAN NOT NULL DEFAULT 0,
        dst REAL,
        hst REAL,
        classification_injection TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_classifications_norm
        ON management_systems_classifications (norm_id)",
];

async fn open_pool(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Open the catalogue store and ensure its schema exists.
pub async fn init_normas_pool(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = open_pool(path).await?;
    for statement in NORMAS_SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    tracing::info!(path, "catalogue store ready");
    Ok(pool)
}

/// Open the classification store, creating the schema only when the file is
/// new (the production file arrives pre-populated from the pipeline).
pub async fn init_classificacoes_pool(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = open_pool(path).await?;
    for statement in CLASSIFICACOES_SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    tracing::info!(path, "classification store ready");
    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    // A single connection keeps the in-memory database alive and shared
    // across every query in a test.
    async fn memory_pool(schema: &[&str]) -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        for statement in schema {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool
    }

    pub(crate) async fn normas_pool() -> SqlitePool {
        memory_pool(NORMAS_SCHEMA).await
    }

    pub(crate) async fn classificacoes_pool() -> SqlitePool {
        memory_pool(CLASSIFICACOES_SCHEMA).await
    }
}
