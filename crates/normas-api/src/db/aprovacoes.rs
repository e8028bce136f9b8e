//! Approval ledger persistence. Append and read only — there is no update
//! or delete statement in this module, matching the append-only contract.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use normas_core::{Aprovacao, StatusAprovacao, UltimoStatus};

/// Append a decision event and return the ledger-assigned event id.
pub async fn registrar(
    pool: &SqlitePool,
    norma_id: i64,
    status: StatusAprovacao,
    solicitante: &str,
    observacao: Option<&str>,
    data_registro: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO tb_normas_aprovacoes (norma_id, status, solicitante, data_registro, observacao) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(norma_id)
    .bind(status.as_str())
    .bind(solicitante)
    .bind(data_registro)
    .bind(observacao)
    .fetch_one(pool)
    .await
}

/// Full event history for one norma, newest first.
pub async fn historico(
    pool: &SqlitePool,
    norma_id: i64,
) -> Result<Vec<Aprovacao>, sqlx::Error> {
    let rows: Vec<AprovacaoRow> = sqlx::query_as(
        "SELECT id, norma_id, status, solicitante, data_registro, observacao \
         FROM tb_normas_aprovacoes WHERE norma_id = ? \
         ORDER BY data_registro DESC, id DESC",
    )
    .bind(norma_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AprovacaoRow::into_aprovacao).collect()
}

/// Latest-status projection: greatest `data_registro`, ties broken by the
/// highest event id. `None` when the norma has no history.
pub async fn ultimo_status(
    pool: &SqlitePool,
    norma_id: i64,
) -> Result<Option<UltimoStatus>, sqlx::Error> {
    let row: Option<AprovacaoRow> = sqlx::query_as(
        "SELECT id, norma_id, status, solicitante, data_registro, observacao \
         FROM tb_normas_aprovacoes WHERE norma_id = ? \
         ORDER BY data_registro DESC, id DESC LIMIT 1",
    )
    .bind(norma_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        let evento = r.into_aprovacao()?;
        Ok(UltimoStatus {
            status: evento.status,
            solicitante: evento.solicitante,
            data_registro: evento.data_registro,
            observacao: evento.observacao,
        })
    })
    .transpose()
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ContagemPorStatus {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ContagemPorSolicitante {
    pub solicitante: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AprovacoesStats {
    pub total_registros: i64,
    pub por_status: Vec<ContagemPorStatus>,
    pub por_solicitante: Vec<ContagemPorSolicitante>,
}

pub async fn stats(pool: &SqlitePool) -> Result<AprovacoesStats, sqlx::Error> {
    let total_registros: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tb_normas_aprovacoes")
        .fetch_one(pool)
        .await?;

    let por_status = sqlx::query_as(
        "SELECT status, COUNT(*) as count FROM tb_normas_aprovacoes \
         GROUP BY status ORDER BY count DESC",
    )
    .fetch_all(pool)
    .await?;

    let por_solicitante = sqlx::query_as(
        "SELECT solicitante, COUNT(*) as count FROM tb_normas_aprovacoes \
         GROUP BY solicitante ORDER BY count DESC LIMIT 10",
    )
    .fetch_all(pool)
    .await?;

    Ok(AprovacoesStats {
        total_registros,
        por_status,
        por_solicitante,
    })
}

/// One event with its norma's title attached, for per-requester listings.
/// The join is LEFT: events outlive their norma.
#[derive(Debug, Serialize)]
pub struct AprovacaoComNorma {
    pub id: i64,
    pub norma_id: i64,
    pub status: StatusAprovacao,
    pub solicitante: String,
    pub data_registro: DateTime<Utc>,
    pub observacao: Option<String>,
    pub numero_norma: Option<String>,
    pub titulo_da_norma: Option<String>,
}

pub async fn por_solicitante(
    pool: &SqlitePool,
    solicitante: &str,
) -> Result<Vec<AprovacaoComNorma>, sqlx::Error> {
    let rows: Vec<AprovacaoComNormaRow> = sqlx::query_as(
        "SELECT a.id, a.norma_id, a.status, a.solicitante, a.data_registro, a.observacao, \
         n.numero_norma, n.titulo_da_norma \
         FROM tb_normas_aprovacoes a \
         LEFT JOIN tb_normas_consolidadas n ON n.id = a.norma_id \
         WHERE a.solicitante = ? \
         ORDER BY a.data_registro DESC, a.id DESC",
    )
    .bind(solicitante)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AprovacaoComNormaRow::into_record).collect()
}

fn parse_status(raw: &str) -> Result<StatusAprovacao, sqlx::Error> {
    StatusAprovacao::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[derive(sqlx::FromRow)]
struct AprovacaoRow {
    id: i64,
    norma_id: i64,
    status: String,
    solicitante: String,
    data_registro: DateTime<Utc>,
    observacao: Option<String>,
}

impl AprovacaoRow {
    fn into_aprovacao(self) -> Result<Aprovacao, sqlx::Error> {
        Ok(Aprovacao {
            id: self.id,
            norma_id: self.norma_id,
            status: parse_status(&self.status)?,
            solicitante: self.solicitante,
            data_registro: self.data_registro,
            observacao: self.observacao,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AprovacaoComNormaRow {
    id: i64,
    norma_id: i64,
    status: String,
    solicitante: String,
    data_registro: DateTime<Utc>,
    observacao: Option<String>,
    numero_norma: Option<String>,
    titulo_da_norma: Option<String>,
}

impl AprovacaoComNormaRow {
    fn into_record(self) -> Result<AprovacaoComNorma, sqlx::Error> {
        Ok(AprovacaoComNorma {
            id: self.id,
            norma_id: self.norma_id,
            status: parse_status(&self.status)?,
            solicitante: self.solicitante,
            data_registro: self.data_registro,
            observacao: self.observacao,
            numero_norma: self.numero_norma,
            titulo_da_norma: self.titulo_da_norma,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::normas_pool;
    use chrono::Duration;

    #[tokio::test]
    async fn latest_status_follows_registration_time_then_id() {
        let pool = normas_pool().await;
        let base = Utc::now();

        registrar(&pool, 1, StatusAprovacao::Aprovado, "Ana", None, base)
            .await
            .unwrap();
        registrar(
            &pool,
            1,
            StatusAprovacao::Recusado,
            "Bia",
            Some("documento vencido"),
            base + Duration::seconds(5),
        )
        .await
        .unwrap();

        let ultimo = ultimo_status(&pool, 1).await.unwrap().unwrap();
        assert_eq!(ultimo.status, StatusAprovacao::Recusado);
        assert_eq!(ultimo.solicitante, "Bia");
        assert_eq!(ultimo.observacao.as_deref(), Some("documento vencido"));
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_highest_id() {
        let pool = normas_pool().await;
        let instante = Utc::now();

        registrar(&pool, 7, StatusAprovacao::Aprovado, "Ana", None, instante)
            .await
            .unwrap();
        registrar(&pool, 7, StatusAprovacao::Recusado, "Ana", None, instante)
            .await
            .unwrap();

        let ultimo = ultimo_status(&pool, 7).await.unwrap().unwrap();
        assert_eq!(ultimo.status, StatusAprovacao::Recusado);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_complete() {
        let pool = normas_pool().await;
        let base = Utc::now();
        for i in 0..3 {
            registrar(
                &pool,
                2,
                StatusAprovacao::Aprovado,
                "Ana",
                None,
                base + Duration::seconds(i),
            )
            .await
            .unwrap();
        }
        registrar(&pool, 3, StatusAprovacao::Recusado, "Bia", None, base)
            .await
            .unwrap();

        let eventos = historico(&pool, 2).await.unwrap();
        assert_eq!(eventos.len(), 3);
        assert!(eventos
            .windows(2)
            .all(|w| w[0].data_registro >= w[1].data_registro));
    }

    #[tokio::test]
    async fn no_history_yields_none() {
        let pool = normas_pool().await;
        assert!(ultimo_status(&pool, 99).await.unwrap().is_none());
        assert!(historico(&pool, 99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resubmitting_the_same_decision_appends() {
        let pool = normas_pool().await;
        let base = Utc::now();
        registrar(&pool, 4, StatusAprovacao::Aprovado, "Ana", None, base)
            .await
            .unwrap();
        registrar(
            &pool,
            4,
            StatusAprovacao::Aprovado,
            "Ana",
            None,
            base + Duration::seconds(1),
        )
        .await
        .unwrap();
        assert_eq!(historico(&pool, 4).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn per_requester_listing_joins_title_and_survives_deletion() {
        let pool = normas_pool().await;
        registrar(&pool, 123, StatusAprovacao::Aprovado, "Ana", None, Utc::now())
            .await
            .unwrap();

        // norma 123 never existed in the catalogue; the event still lists.
        let eventos = por_solicitante(&pool, "Ana").await.unwrap();
        assert_eq!(eventos.len(), 1);
        assert!(eventos[0].titulo_da_norma.is_none());
    }

    #[tokio::test]
    async fn stats_group_by_status() {
        let pool = normas_pool().await;
        let base = Utc::now();
        registrar(&pool, 1, StatusAprovacao::Aprovado, "Ana", None, base)
            .await
            .unwrap();
        registrar(&pool, 2, StatusAprovacao::Aprovado, "Bia", None, base)
            .await
            .unwrap();
        registrar(&pool, 3, StatusAprovacao::Recusado, "Ana", None, base)
            .await
            .unwrap();

        let s = stats(&pool).await.unwrap();
        assert_eq!(s.total_registros, 3);
        assert_eq!(s.por_status[0].status, "aprovado");
        assert_eq!(s.por_status[0].count, 2);
    }
}
