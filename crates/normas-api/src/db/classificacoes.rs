//! Classification store reads. This file is populated by an external
//! pipeline; the service never writes to it.

use serde::Serialize;
use sqlx::SqlitePool;

/// Distinct norma ids carrying at least one positive classification.
/// Input to the reconciliation job's set phase.
pub async fn normas_classificadas(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT DISTINCT norm_id FROM management_systems_classifications \
         WHERE classification = 1 ORDER BY norm_id",
    )
    .fetch_all(pool)
    .await
}

/// One classification verdict for a norma under one management system.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Classificacao {
    pub norm_id: i64,
    pub mngm_sys: Option<String>,
    pub classification: bool,
    pub dst: Option<f64>,
    pub hst: Option<f64>,
    pub classification_injection: Option<String>,
}

/// Every classification row for one norma, across all management systems,
/// most recently injected first.
pub async fn por_norma(
    pool: &SqlitePool,
    norma_id: i64,
) -> Result<Vec<Classificacao>, sqlx::Error> {
    sqlx::query_as(
        "SELECT norm_id, mngm_sys, classification, dst, hst, classification_injection \
         FROM management_systems_classifications \
         WHERE norm_id = ? ORDER BY classification_injection DESC",
    )
    .bind(norma_id)
    .fetch_all(pool)
    .await
}
