//! # Applicability Reconciliation Job
//!
//! Recomputes `aplicavel` across the whole catalogue from the classification
//! store, on demand. Full reset-then-set: every run starts by clearing the
//! flag on every row, then marks the currently classified set. A run is
//! never resumed; a failed run is retried whole by the caller.
//!
//! There is no cross-store transaction — the two stores are separate files.
//! The reset and set phases run on the catalogue store only; the
//! classification store is read once in between.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;

/// How many marked ids the outcome reports back. The count is always exact;
/// the id list is a sample for operator feedback.
const MAX_REPORTED_IDS: usize = 100;

/// Result of one reconciliation run.
#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    pub message: String,
    pub total_atualizadas: i64,
    pub normas_ids: Vec<i64>,
}

/// Run the job: ensure the flag column exists, clear it everywhere, then
/// mark every norma with at least one positive classification.
pub async fn sincronizar_aplicaveis(
    normas: &SqlitePool,
    classificacoes: &SqlitePool,
) -> Result<SyncOutcome, AppError> {
    db::normas::ensure_aplicavel_column(normas).await?;
    db::normas::reset_aplicavel(normas).await?;

    let ids = db::classificacoes::normas_classificadas(classificacoes).await?;
    if ids.is_empty() {
        tracing::info!("reconciliation run: no classified normas, all flags cleared");
        return Ok(SyncOutcome {
            message: "Nenhuma norma classificada encontrada".to_string(),
            total_atualizadas: 0,
            normas_ids: Vec::new(),
        });
    }

    db::normas::marcar_aplicaveis(normas, &ids).await?;

    // The count follows the classification store, matching-row or not, so
    // repeated runs against unchanged inputs report the same number.
    let total = ids.len() as i64;
    tracing::info!(total, "reconciliation run complete");

    Ok(SyncOutcome {
        message: "Sincronização concluída com sucesso".to_string(),
        total_atualizadas: total,
        normas_ids: ids.into_iter().take(MAX_REPORTED_IDS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{classificacoes_pool, normas_pool};
    use normas_core::NormaDraft;

    async fn seed_norma(pool: &SqlitePool, numero: &str) -> i64 {
        let draft = NormaDraft {
            numero_norma: Some(numero.to_string()),
            tipo_norma: Some("Lei".to_string()),
            orgao_emissor: Some("IBAMA".to_string()),
            titulo_da_norma: Some(format!("Lei {numero}")),
            ..NormaDraft::default()
        }
        .validate()
        .unwrap();
        db::normas::insert(pool, &draft).await.unwrap()
    }

    async fn seed_classificacao(pool: &SqlitePool, norm_id: i64, positive: bool) {
        sqlx::query(
            "INSERT INTO management_systems_classifications \
             (norm_id, mngm_sys, classification) VALUES (?, 'ISO14001', ?)",
        )
        .bind(norm_id)
        .bind(positive)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn aplicavel(pool: &SqlitePool, id: i64) -> bool {
        db::normas::get(pool, id).await.unwrap().unwrap().aplicavel
    }

    #[tokio::test]
    async fn marks_classified_and_clears_the_rest() {
        let normas = normas_pool().await;
        let class = classificacoes_pool().await;
        let a = seed_norma(&normas, "1").await;
        let b = seed_norma(&normas, "2").await;
        seed_classificacao(&class, a, true).await;
        seed_classificacao(&class, b, false).await;

        let outcome = sincronizar_aplicaveis(&normas, &class).await.unwrap();
        assert_eq!(outcome.total_atualizadas, 1);
        assert_eq!(outcome.normas_ids, vec![a]);
        assert!(aplicavel(&normas, a).await);
        assert!(!aplicavel(&normas, b).await);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let normas = normas_pool().await;
        let class = classificacoes_pool().await;
        let a = seed_norma(&normas, "1").await;
        seed_classificacao(&class, a, true).await;

        let first = sincronizar_aplicaveis(&normas, &class).await.unwrap();
        let second = sincronizar_aplicaveis(&normas, &class).await.unwrap();
        assert_eq!(first.total_atualizadas, second.total_atualizadas);
        assert!(aplicavel(&normas, a).await);
    }

    #[tokio::test]
    async fn declassification_clears_a_previously_marked_norma() {
        let normas = normas_pool().await;
        let class = classificacoes_pool().await;
        let a = seed_norma(&normas, "1").await;
        seed_classificacao(&class, a, true).await;
        sincronizar_aplicaveis(&normas, &class).await.unwrap();
        assert!(aplicavel(&normas, a).await);

        sqlx::query("DELETE FROM management_systems_classifications WHERE norm_id = ?")
            .bind(a)
            .execute(&class)
            .await
            .unwrap();

        let outcome = sincronizar_aplicaveis(&normas, &class).await.unwrap();
        assert_eq!(outcome.total_atualizadas, 0);
        assert!(!aplicavel(&normas, a).await);
    }

    #[tokio::test]
    async fn empty_classification_store_resets_everything() {
        let normas = normas_pool().await;
        let class = classificacoes_pool().await;
        let a = seed_norma(&normas, "1").await;
        sqlx::query("UPDATE tb_normas_consolidadas SET aplicavel = 1")
            .execute(&normas)
            .await
            .unwrap();

        let outcome = sincronizar_aplicaveis(&normas, &class).await.unwrap();
        assert_eq!(outcome.total_atualizadas, 0);
        assert!(outcome.normas_ids.is_empty());
        assert!(!aplicavel(&normas, a).await);
    }

    #[tokio::test]
    async fn counts_classified_ids_without_catalogue_rows() {
        let normas = normas_pool().await;
        let class = classificacoes_pool().await;
        seed_classificacao(&class, 9999, true).await;

        let outcome = sincronizar_aplicaveis(&normas, &class).await.unwrap();
        assert_eq!(outcome.total_atualizadas, 1);
    }
}
