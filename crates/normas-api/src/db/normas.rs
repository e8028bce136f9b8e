//! Catalogue (norma) persistence operations.
//!
//! All predicates are parameterized through [`sqlx::QueryBuilder`] —
//! user-supplied values are always bound, never interpolated into SQL text.
//!
//! The derived `status_aprovacao` attribute is computed by a correlated
//! subquery over the approval ledger and participates in the WHERE clause
//! *before* the LIMIT/OFFSET window, so the matched count, the page
//! contents, and the derived filter always agree.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use normas_core::norma::ValidatedDraft;
use normas_core::{Norma, NormaFilter, NormaPatch, PageParams};

/// Latest approval event for a norma row `n`: greatest `data_registro`,
/// ties broken by highest event id.
const ULTIMO_STATUS: &str = "(SELECT a.status FROM tb_normas_aprovacoes a \
     WHERE a.norma_id = n.id \
     ORDER BY a.data_registro DESC, a.id DESC LIMIT 1)";

/// Publication date descending, NULLs last, ascending id as the
/// deterministic tiebreak.
const SCAN_ORDER: &str = " ORDER BY CASE WHEN n.data_publicacao IS NULL THEN 1 ELSE 0 END, \
     n.data_publicacao DESC, n.id ASC";

fn select_prefix() -> String {
    format!(
        "SELECT n.id, n.numero_norma, n.tipo_norma, n.orgao_emissor, n.titulo_da_norma, \
         n.ementa, n.data_publicacao, n.divisao_politica, n.origem_dado, \
         n.origem_publicacao, n.status_vigencia, n.lake_ingestao, n.aplicavel, \
         n.atualizado_em, {ULTIMO_STATUS} AS status_aprovacao \
         FROM tb_normas_consolidadas n"
    )
}

/// Append the WHERE clause for the supplied filter set. Exact filters bind
/// equality, substring filters use `instr()` (case-sensitive, unlike SQLite
/// LIKE), and the derived-status filter repeats the correlated subquery.
fn push_filtros<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filtro: &'a NormaFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(tipo) = &filtro.tipo_norma {
        qb.push(" AND n.tipo_norma = ").push_bind(tipo);
    }
    if let Some(orgao) = &filtro.orgao_emissor {
        qb.push(" AND instr(n.orgao_emissor, ")
            .push_bind(orgao)
            .push(") > 0");
    }
    if let Some(origem) = &filtro.origem_publicacao {
        qb.push(" AND n.origem_publicacao = ").push_bind(origem);
    }
    if let Some(origem) = &filtro.origem_dado {
        qb.push(" AND n.origem_dado = ").push_bind(origem);
    }
    if let Some(status) = &filtro.status_vigencia {
        qb.push(" AND n.status_vigencia = ").push_bind(status);
    }
    if let Some(divisao) = &filtro.divisao_politica {
        qb.push(" AND instr(n.divisao_politica, ")
            .push_bind(divisao)
            .push(") > 0");
    }
    if let Some(aplicavel) = filtro.aplicavel {
        qb.push(" AND n.aplicavel = ").push_bind(aplicavel);
    }
    if let Some(search) = &filtro.search {
        qb.push(" AND (instr(n.titulo_da_norma, ")
            .push_bind(search)
            .push(") > 0 OR instr(n.ementa, ")
            .push_bind(search)
            .push(") > 0 OR instr(n.numero_norma, ")
            .push_bind(search)
            .push(") > 0)");
    }
    if let Some(status) = filtro.status_aprovacao {
        qb.push(" AND ")
            .push(ULTIMO_STATUS)
            .push(" = ")
            .push_bind(status.as_str());
    }
}

/// Predicate-filtered paginated scan. Returns the page of rows plus the
/// count of rows matching the full predicate set ignoring the window.
pub async fn scan(
    pool: &SqlitePool,
    filtro: &NormaFilter,
    page: PageParams,
) -> Result<(Vec<Norma>, i64), sqlx::Error> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM tb_normas_consolidadas n");
    push_filtros(&mut count_qb, filtro);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let (limit, offset) = page.window();
    let mut qb = QueryBuilder::new(select_prefix());
    push_filtros(&mut qb, filtro);
    qb.push(SCAN_ORDER);
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows: Vec<NormaRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok((rows.into_iter().map(NormaRow::into_norma).collect(), total))
}

/// Point lookup by id, with the derived latest approval status attached.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Norma>, sqlx::Error> {
    let mut qb = QueryBuilder::new(select_prefix());
    qb.push(" WHERE n.id = ").push_bind(id);
    let row: Option<NormaRow> = qb.build_query_as().fetch_optional(pool).await?;
    Ok(row.map(NormaRow::into_norma))
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tb_normas_consolidadas WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Insert a validated draft and return the store-assigned id.
pub async fn insert(pool: &SqlitePool, draft: &ValidatedDraft) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO tb_normas_consolidadas (numero_norma, tipo_norma, orgao_emissor, \
         titulo_da_norma, ementa, data_publicacao, divisao_politica, origem_dado, \
         origem_publicacao, status_vigencia, lake_ingestao, aplicavel) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0) \
         RETURNING id",
    )
    .bind(&draft.numero_norma)
    .bind(&draft.tipo_norma)
    .bind(&draft.orgao_emissor)
    .bind(&draft.titulo_da_norma)
    .bind(&draft.ementa)
    .bind(&draft.data_publicacao)
    .bind(&draft.divisao_politica)
    .bind(&draft.origem_dado)
    .bind(&draft.origem_publicacao)
    .bind(&draft.status_vigencia)
    .bind(&draft.lake_ingestao)
    .fetch_one(pool)
    .await
}

/// Apply a partial update, stamping `atualizado_em`. Returns false when the
/// id does not exist. A supplied blank value on an optional column clears it
/// to NULL; unsupplied columns are untouched.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    patch: &NormaPatch,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    // Blank-to-NULL for optional text columns.
    fn clear_blank(value: &Option<String>) -> Option<Option<&str>> {
        value.as_deref().map(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tb_normas_consolidadas SET ");
    let mut sets = qb.separated(", ");

    if let Some(v) = &patch.numero_norma {
        sets.push("numero_norma = ").push_bind_unseparated(v);
    }
    if let Some(v) = &patch.tipo_norma {
        sets.push("tipo_norma = ").push_bind_unseparated(v);
    }
    if let Some(v) = &patch.orgao_emissor {
        sets.push("orgao_emissor = ").push_bind_unseparated(v);
    }
    if let Some(v) = &patch.titulo_da_norma {
        sets.push("titulo_da_norma = ").push_bind_unseparated(v);
    }
    if let Some(v) = clear_blank(&patch.ementa) {
        sets.push("ementa = ").push_bind_unseparated(v);
    }
    if let Some(v) = clear_blank(&patch.data_publicacao) {
        sets.push("data_publicacao = ").push_bind_unseparated(v);
    }
    if let Some(v) = clear_blank(&patch.divisao_politica) {
        sets.push("divisao_politica = ").push_bind_unseparated(v);
    }
    if let Some(v) = &patch.origem_dado {
        sets.push("origem_dado = ").push_bind_unseparated(v);
    }
    if let Some(v) = clear_blank(&patch.origem_publicacao) {
        sets.push("origem_publicacao = ").push_bind_unseparated(v);
    }
    if let Some(v) = clear_blank(&patch.status_vigencia) {
        sets.push("status_vigencia = ").push_bind_unseparated(v);
    }
    if let Some(v) = clear_blank(&patch.lake_ingestao) {
        sets.push("lake_ingestao = ").push_bind_unseparated(v);
    }
    if let Some(v) = patch.aplicavel {
        sets.push("aplicavel = ").push_bind_unseparated(v);
    }
    sets.push("atualizado_em = ").push_bind_unseparated(now);

    qb.push(" WHERE id = ").push_bind(id);
    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Delete by id. Approval history is deliberately left in place (orphaned
/// but queryable).
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tb_normas_consolidadas WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ContagemPorTipo {
    pub tipo_norma: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ContagemPorOrgao {
    pub orgao_emissor: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ContagemPorVigencia {
    pub status_vigencia: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct NormasStats {
    pub total_normas: i64,
    pub por_tipo: Vec<ContagemPorTipo>,
    pub por_orgao: Vec<ContagemPorOrgao>,
    pub por_status: Vec<ContagemPorVigencia>,
}

pub async fn stats(pool: &SqlitePool) -> Result<NormasStats, sqlx::Error> {
    let total_normas: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tb_normas_consolidadas")
        .fetch_one(pool)
        .await?;

    let por_tipo = sqlx::query_as(
        "SELECT tipo_norma, COUNT(*) as count FROM tb_normas_consolidadas \
         WHERE tipo_norma IS NOT NULL GROUP BY tipo_norma ORDER BY count DESC",
    )
    .fetch_all(pool)
    .await?;

    let por_orgao = sqlx::query_as(
        "SELECT orgao_emissor, COUNT(*) as count FROM tb_normas_consolidadas \
         WHERE orgao_emissor IS NOT NULL GROUP BY orgao_emissor \
         ORDER BY count DESC LIMIT 10",
    )
    .fetch_all(pool)
    .await?;

    let por_status = sqlx::query_as(
        "SELECT status_vigencia, COUNT(*) as count FROM tb_normas_consolidadas \
         WHERE status_vigencia IS NOT NULL GROUP BY status_vigencia",
    )
    .fetch_all(pool)
    .await?;

    Ok(NormasStats {
        total_normas,
        por_tipo,
        por_orgao,
        por_status,
    })
}

/// Distinct values for each filterable column, for filter dropdowns.
#[derive(Debug, Serialize)]
pub struct FiltrosValores {
    pub tipo_norma: Vec<String>,
    pub divisao_politica: Vec<String>,
    pub status_vigencia: Vec<String>,
    pub origem_publicacao: Vec<String>,
    pub origem_dado: Vec<String>,
}

pub async fn filtros_valores(pool: &SqlitePool) -> Result<FiltrosValores, sqlx::Error> {
    async fn distinct(pool: &SqlitePool, column: &str) -> Result<Vec<String>, sqlx::Error> {
        // Column names come from the fixed list below, never from input.
        sqlx::query_scalar(&format!(
            "SELECT DISTINCT {column} FROM tb_normas_consolidadas \
             WHERE {column} IS NOT NULL ORDER BY {column}"
        ))
        .fetch_all(pool)
        .await
    }

    Ok(FiltrosValores {
        tipo_norma: distinct(pool, "tipo_norma").await?,
        divisao_politica: distinct(pool, "divisao_politica").await?,
        status_vigencia: distinct(pool, "status_vigencia").await?,
        origem_publicacao: distinct(pool, "origem_publicacao").await?,
        origem_dado: distinct(pool, "origem_dado").await?,
    })
}

// ---------------------------------------------------------------------------
// Reconciliation write path
// ---------------------------------------------------------------------------

/// Lazily add the `aplicavel` column: catalogue files produced by older
/// ingestion runs predate it.
pub async fn ensure_aplicavel_column(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let present: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('tb_normas_consolidadas') \
         WHERE name = 'aplicavel'",
    )
    .fetch_one(pool)
    .await?;

    if present == 0 {
        sqlx::query(
            "ALTER TABLE tb_normas_consolidadas \
             ADD COLUMN aplicavel BOOLEAN NOT NULL DEFAULT 0",
        )
        .execute(pool)
        .await?;
        tracing::info!("added missing aplicavel column to catalogue store");
    }
    Ok(())
}

/// Reset every row to not-applicable. First phase of the reconciliation
/// job's full reset-then-set pass.
pub async fn reset_aplicavel(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tb_normas_consolidadas SET aplicavel = 0")
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark the given ids applicable. Ids without a matching row are ignored —
/// the classification store has no referential integrity with this one.
pub async fn marcar_aplicaveis(pool: &SqlitePool, ids: &[i64]) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb =
        QueryBuilder::<Sqlite>::new("UPDATE tb_normas_consolidadas SET aplicavel = 1 WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    qb.push(")");

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct NormaRow {
    id: i64,
    numero_norma: String,
    tipo_norma: String,
    orgao_emissor: String,
    titulo_da_norma: String,
    ementa: Option<String>,
    data_publicacao: Option<String>,
    divisao_politica: Option<String>,
    origem_dado: String,
    origem_publicacao: Option<String>,
    status_vigencia: Option<String>,
    lake_ingestao: Option<String>,
    aplicavel: bool,
    atualizado_em: Option<DateTime<Utc>>,
    status_aprovacao: Option<String>,
}

impl NormaRow {
    fn into_norma(self) -> Norma {
        Norma {
            id: self.id,
            numero_norma: self.numero_norma,
            tipo_norma: self.tipo_norma,
            orgao_emissor: self.orgao_emissor,
            titulo_da_norma: self.titulo_da_norma,
            ementa: self.ementa,
            data_publicacao: self.data_publicacao,
            divisao_politica: self.divisao_politica,
            origem_dado: self.origem_dado,
            origem_publicacao: self.origem_publicacao,
            status_vigencia: self.status_vigencia,
            lake_ingestao: self.lake_ingestao,
            aplicavel: self.aplicavel,
            atualizado_em: self.atualizado_em,
            status_aprovacao: self.status_aprovacao,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::normas_pool;
    use normas_core::NormaDraft;

    fn draft(numero: &str, tipo: &str) -> ValidatedDraft {
        NormaDraft {
            numero_norma: Some(numero.to_string()),
            tipo_norma: Some(tipo.to_string()),
            orgao_emissor: Some("IBAMA".to_string()),
            titulo_da_norma: Some(format!("{tipo} {numero}")),
            ..NormaDraft::default()
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_with_sentinel_origin() {
        let pool = normas_pool().await;
        let id = insert(&pool, &draft("1.111", "Lei")).await.unwrap();

        let norma = get(&pool, id).await.unwrap().unwrap();
        assert_eq!(norma.numero_norma, "1.111");
        assert_eq!(norma.origem_dado, "SITE");
        assert!(!norma.aplicavel);
        assert!(norma.atualizado_em.is_none());
        assert!(norma.status_aprovacao.is_none());
    }

    #[tokio::test]
    async fn update_touches_only_supplied_fields() {
        let pool = normas_pool().await;
        let id = insert(&pool, &draft("2.222", "Decreto")).await.unwrap();

        let patch = NormaPatch {
            ementa: Some("Dispõe sobre licenciamento".to_string()),
            ..NormaPatch::default()
        };
        assert!(update(&pool, id, &patch, Utc::now()).await.unwrap());

        let norma = get(&pool, id).await.unwrap().unwrap();
        assert_eq!(norma.ementa.as_deref(), Some("Dispõe sobre licenciamento"));
        assert_eq!(norma.numero_norma, "2.222");
        assert!(norma.atualizado_em.is_some());
    }

    #[tokio::test]
    async fn repeated_updates_advance_atualizado_em() {
        let pool = normas_pool().await;
        let id = insert(&pool, &draft("2.223", "Decreto")).await.unwrap();

        let t1 = Utc::now();
        let patch = NormaPatch {
            ementa: Some("primeira redação".to_string()),
            ..NormaPatch::default()
        };
        update(&pool, id, &patch, t1).await.unwrap();
        let first = get(&pool, id).await.unwrap().unwrap().atualizado_em.unwrap();

        let patch = NormaPatch {
            ementa: Some("segunda redação".to_string()),
            ..NormaPatch::default()
        };
        update(&pool, id, &patch, t1 + chrono::Duration::seconds(3))
            .await
            .unwrap();
        let second = get(&pool, id).await.unwrap().unwrap().atualizado_em.unwrap();

        assert!(second > first);
    }

    #[tokio::test]
    async fn update_with_blank_optional_clears_to_null() {
        let pool = normas_pool().await;
        let id = insert(&pool, &draft("3.333", "Portaria")).await.unwrap();

        let patch = NormaPatch {
            ementa: Some("alguma ementa".to_string()),
            ..NormaPatch::default()
        };
        update(&pool, id, &patch, Utc::now()).await.unwrap();

        let patch = NormaPatch {
            ementa: Some("".to_string()),
            ..NormaPatch::default()
        };
        update(&pool, id, &patch, Utc::now()).await.unwrap();

        let norma = get(&pool, id).await.unwrap().unwrap();
        assert!(norma.ementa.is_none());
    }

    #[tokio::test]
    async fn update_missing_id_reports_absent() {
        let pool = normas_pool().await;
        let patch = NormaPatch {
            ementa: Some("x".to_string()),
            ..NormaPatch::default()
        };
        assert!(!update(&pool, 999, &patch, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_twice_reports_absent_second_time() {
        let pool = normas_pool().await;
        let id = insert(&pool, &draft("4.444", "Lei")).await.unwrap();
        assert!(delete(&pool, id).await.unwrap());
        assert!(get(&pool, id).await.unwrap().is_none());
        assert!(!delete(&pool, id).await.unwrap());
    }

    #[tokio::test]
    async fn scan_pages_are_disjoint_and_cover_the_match_set() {
        let pool = normas_pool().await;
        for i in 0..7 {
            let mut d = draft(&format!("{i}"), "Lei");
            d.data_publicacao = Some(format!("2024-01-0{}", i + 1));
            insert(&pool, &d).await.unwrap();
        }

        let filtro = NormaFilter::default();
        let mut seen = Vec::new();
        let mut total_reported = 0;
        for page in 1..=3 {
            let params = PageParams::new(Some(page), Some(3)).unwrap();
            let (rows, total) = scan(&pool, &filtro, params).await.unwrap();
            total_reported = total;
            for row in rows {
                assert!(!seen.contains(&row.id), "page overlap on id {}", row.id);
                seen.push(row.id);
            }
        }
        assert_eq!(total_reported, 7);
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn scan_orders_by_publication_date_desc_nulls_last() {
        let pool = normas_pool().await;
        let mut a = draft("a", "Lei");
        a.data_publicacao = Some("2023-05-01".to_string());
        let mut b = draft("b", "Lei");
        b.data_publicacao = Some("2024-05-01".to_string());
        let c = draft("c", "Lei"); // no date
        let id_a = insert(&pool, &a).await.unwrap();
        let id_b = insert(&pool, &b).await.unwrap();
        let id_c = insert(&pool, &c).await.unwrap();

        let (rows, _) = scan(&pool, &NormaFilter::default(), PageParams::default())
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![id_b, id_a, id_c]);
    }

    #[tokio::test]
    async fn search_is_case_sensitive_substring_over_three_columns() {
        let pool = normas_pool().await;
        let mut a = draft("555", "Lei");
        a.ementa = Some("Resíduos sólidos urbanos".to_string());
        insert(&pool, &a).await.unwrap();

        let mut filtro = NormaFilter::default();
        filtro.search = Some("sólidos".to_string());
        let (rows, total) = scan(&pool, &filtro, PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows.len(), 1);

        // Case-sensitive: different case does not match.
        filtro.search = Some("SÓLIDOS".to_string());
        let (_, total) = scan(&pool, &filtro, PageParams::default()).await.unwrap();
        assert_eq!(total, 0);

        // Matches numero_norma too.
        filtro.search = Some("555".to_string());
        let (_, total) = scan(&pool, &filtro, PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn derived_status_filter_keeps_total_consistent() {
        let pool = normas_pool().await;
        let id1 = insert(&pool, &draft("10", "Lei")).await.unwrap();
        let id2 = insert(&pool, &draft("11", "Lei")).await.unwrap();
        insert(&pool, &draft("12", "Lei")).await.unwrap();

        crate::db::aprovacoes::registrar(
            &pool,
            id1,
            normas_core::StatusAprovacao::Aprovado,
            "Ana",
            None,
            Utc::now(),
        )
        .await
        .unwrap();
        crate::db::aprovacoes::registrar(
            &pool,
            id2,
            normas_core::StatusAprovacao::Recusado,
            "Ana",
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        let mut filtro = NormaFilter::default();
        filtro.status_aprovacao = Some(normas_core::StatusAprovacao::Aprovado);
        let (rows, total) = scan(&pool, &filtro, PageParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id1);
        assert_eq!(rows[0].status_aprovacao.as_deref(), Some("aprovado"));
    }

    #[tokio::test]
    async fn marcar_aplicaveis_ignores_unknown_ids() {
        let pool = normas_pool().await;
        let id = insert(&pool, &draft("20", "Lei")).await.unwrap();
        let updated = marcar_aplicaveis(&pool, &[id, 9999]).await.unwrap();
        assert_eq!(updated, 1);
        assert!(get(&pool, id).await.unwrap().unwrap().aplicavel);
    }

    #[tokio::test]
    async fn ensure_aplicavel_column_is_idempotent() {
        let pool = normas_pool().await;
        ensure_aplicavel_column(&pool).await.unwrap();
        ensure_aplicavel_column(&pool).await.unwrap();
    }
}
