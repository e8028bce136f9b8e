//! # Catalogue Endpoints
//!
//! List/read/write routes over the norma catalogue plus the applicability
//! reconciliation trigger. All routes here require authentication; admin is
//! not required for catalogue writes.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use normas_core::{
    Norma, NormaDraft, NormaFilter, NormaPatch, PageParams, PaginationMeta, StatusAprovacao,
};

use crate::db;
use crate::error::AppError;
use crate::state::AppState;
use crate::sync;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/normas", get(list_normas).post(create_norma))
        .route("/normas/aplicaveis", get(list_aplicaveis))
        .route("/normas/stats", get(stats))
        .route("/normas/filtros/valores", get(filtros_valores))
        .route("/normas/sync-aplicavel", post(sync_aplicavel))
        .route(
            "/normas/:id",
            get(get_norma).put(update_norma).delete(delete_norma),
        )
        .route(
            "/normas/:id/management-systems",
            get(norma_management_systems),
        )
}

/// Raw query parameters for catalogue listings. Paging values arrive as
/// strings so non-numeric input gets a named 400 instead of a generic
/// deserialization failure.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NormasQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub tipo_norma: Option<String>,
    pub orgao_emissor: Option<String>,
    pub origem_publicacao: Option<String>,
    pub origem_dado: Option<String>,
    pub status_vigencia: Option<String>,
    pub divisao_politica: Option<String>,
    pub search: Option<String>,
    pub aplicavel: Option<String>,
    pub status_aprovacao: Option<String>,
}

impl NormasQuery {
    fn page_params(&self) -> Result<PageParams, AppError> {
        Ok(PageParams::from_raw(
            self.page.as_deref(),
            self.per_page.as_deref(),
        )?)
    }

    fn filter(&self) -> Result<NormaFilter, AppError> {
        let status_aprovacao = self
            .status_aprovacao
            .as_deref()
            .map(StatusAprovacao::from_str)
            .transpose()?;

        Ok(NormaFilter {
            tipo_norma: self.tipo_norma.clone(),
            orgao_emissor: self.orgao_emissor.clone(),
            origem_publicacao: self.origem_publicacao.clone(),
            origem_dado: self.origem_dado.clone(),
            status_vigencia: self.status_vigencia.clone(),
            divisao_politica: self.divisao_politica.clone(),
            search: self.search.clone(),
            aplicavel: self
                .aplicavel
                .as_deref()
                .map(NormaFilter::parse_aplicavel),
            status_aprovacao,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NormasPage {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Norma>,
    #[schema(value_type = Object)]
    pub pagination: PaginationMeta,
}

async fn paged_scan(
    state: &AppState,
    filtro: NormaFilter,
    page: PageParams,
) -> Result<Json<NormasPage>, AppError> {
    let (data, total) = db::normas::scan(&state.normas, &filtro, page).await?;
    Ok(Json(NormasPage {
        data,
        pagination: PaginationMeta::new(page, total),
    }))
}

/// GET /normas — filtered, paginated catalogue listing.
#[utoipa::path(
    get,
    path = "/normas",
    params(
        ("page" = Option<String>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<String>, Query, description = "Page size (default 20, max 200)"),
        ("tipo_norma" = Option<String>, Query, description = "Exact document type"),
        ("orgao_emissor" = Option<String>, Query, description = "Issuing body substring"),
        ("origem_publicacao" = Option<String>, Query, description = "Exact publication origin"),
        ("origem_dado" = Option<String>, Query, description = "Exact data-source origin"),
        ("status_vigencia" = Option<String>, Query, description = "Exact validity status"),
        ("divisao_politica" = Option<String>, Query, description = "Political-division substring"),
        ("search" = Option<String>, Query, description = "Case-sensitive substring over title, summary and number"),
        ("aplicavel" = Option<String>, Query, description = "Applicability flag (\"true\"/\"false\")"),
        ("status_aprovacao" = Option<String>, Query, description = "Latest approval status (aprovado/recusado)"),
    ),
    responses(
        (status = 200, description = "Page of normas", body = NormasPage),
        (status = 400, description = "Invalid paging or filter value", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn list_normas(
    State(state): State<AppState>,
    Query(query): Query<NormasQuery>,
) -> Result<Json<NormasPage>, AppError> {
    let page = query.page_params()?;
    let filtro = query.filter()?;
    paged_scan(&state, filtro, page).await
}

/// GET /normas/aplicaveis — the same listing engine with the applicability
/// filter defaulted to true.
#[utoipa::path(
    get,
    path = "/normas/aplicaveis",
    responses(
        (status = 200, description = "Page of applicable normas", body = NormasPage),
        (status = 400, description = "Invalid paging or filter value", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn list_aplicaveis(
    State(state): State<AppState>,
    Query(query): Query<NormasQuery>,
) -> Result<Json<NormasPage>, AppError> {
    let page = query.page_params()?;
    let mut filtro = query.filter()?;
    if filtro.aplicavel.is_none() {
        filtro.aplicavel = Some(true);
    }
    paged_scan(&state, filtro, page).await
}

/// GET /normas/:id — one norma with its derived latest approval status.
#[utoipa::path(
    get,
    path = "/normas/{id}",
    params(("id" = i64, Path, description = "Norma id")),
    responses(
        (status = 200, description = "Norma found", body = Object),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn get_norma(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Norma>, AppError> {
    let norma = db::normas::get(&state.normas, id)
        .await?
        .ok_or_else(AppError::norma_not_found)?;
    Ok(Json(norma))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NormaComClassificacoes {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub norma: Norma,
    #[schema(value_type = Vec<Object>)]
    pub management_systems_classifications: Vec<db::classificacoes::Classificacao>,
}

/// GET /normas/:id/management-systems — the norma joined with its rows from
/// the classification store, most recently injected first.
#[utoipa::path(
    get,
    path = "/normas/{id}/management-systems",
    params(("id" = i64, Path, description = "Norma id")),
    responses(
        (status = 200, description = "Norma with classifications", body = NormaComClassificacoes),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn norma_management_systems(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NormaComClassificacoes>, AppError> {
    let norma = db::normas::get(&state.normas, id)
        .await?
        .ok_or_else(AppError::norma_not_found)?;
    let classifications = db::classificacoes::por_norma(&state.classificacoes, id).await?;
    Ok(Json(NormaComClassificacoes {
        norma,
        management_systems_classifications: classifications,
    }))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}

/// POST /normas — create a norma record.
#[utoipa::path(
    post,
    path = "/normas",
    request_body = Object,
    responses(
        (status = 201, description = "Norma created", body = CreatedResponse),
        (status = 400, description = "Missing required fields", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn create_norma(
    State(state): State<AppState>,
    body: Option<Json<NormaDraft>>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let Some(Json(draft)) = body else {
        return Err(AppError::Validation("Dados não fornecidos".to_string()));
    };
    let draft = draft.validate()?;
    let id = db::normas::insert(&state.normas, &draft).await?;
    tracing::info!(id, numero_norma = %draft.numero_norma, "norma created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Norma criada com sucesso".to_string(),
            id,
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// PUT /normas/:id — partial update; only supplied fields change.
#[utoipa::path(
    put,
    path = "/normas/{id}",
    params(("id" = i64, Path, description = "Norma id")),
    request_body = Object,
    responses(
        (status = 200, description = "Norma updated", body = MessageResponse),
        (status = 400, description = "Empty or invalid payload", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn update_norma(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<NormaPatch>>,
) -> Result<Json<MessageResponse>, AppError> {
    let Some(Json(patch)) = body else {
        return Err(AppError::Validation("Dados não fornecidos".to_string()));
    };
    if patch.is_empty() {
        return Err(AppError::Validation("Dados não fornecidos".to_string()));
    }
    let patch = patch.validate()?;

    let updated = db::normas::update(&state.normas, id, &patch, Utc::now()).await?;
    if !updated {
        return Err(AppError::norma_not_found());
    }
    Ok(Json(MessageResponse {
        message: "Norma atualizada com sucesso".to_string(),
    }))
}

/// DELETE /normas/:id — remove a norma; its approval history stays.
#[utoipa::path(
    delete,
    path = "/normas/{id}",
    params(("id" = i64, Path, description = "Norma id")),
    responses(
        (status = 200, description = "Norma removed", body = MessageResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "normas"
)]
pub(crate) async fn delete_norma(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !db::normas::delete(&state.normas, id).await? {
        return Err(AppError::norma_not_found());
    }
    tracing::info!(id, "norma removed");
    Ok(Json(MessageResponse {
        message: "Norma removida com sucesso".to_string(),
    }))
}

/// GET /normas/stats — catalogue aggregations.
#[utoipa::path(
    get,
    path = "/normas/stats",
    responses((status = 200, description = "Catalogue statistics", body = Object)),
    tag = "normas"
)]
pub(crate) async fn stats(
    State(state): State<AppState>,
) -> Result<Json<db::normas::NormasStats>, AppError> {
    Ok(Json(db::normas::stats(&state.normas).await?))
}

/// GET /normas/filtros/valores — distinct values for filter dropdowns.
#[utoipa::path(
    get,
    path = "/normas/filtros/valores",
    responses((status = 200, description = "Distinct filter values", body = Object)),
    tag = "normas"
)]
pub(crate) async fn filtros_valores(
    State(state): State<AppState>,
) -> Result<Json<db::normas::FiltrosValores>, AppError> {
    Ok(Json(db::normas::filtros_valores(&state.normas).await?))
}

/// POST /normas/sync-aplicavel — run the applicability reconciliation job.
#[utoipa::path(
    post,
    path = "/normas/sync-aplicavel",
    responses((status = 200, description = "Reconciliation outcome", body = Object)),
    tag = "normas"
)]
pub(crate) async fn sync_aplicavel(
    State(state): State<AppState>,
) -> Result<Json<sync::SyncOutcome>, AppError> {
    let outcome = sync::sincronizar_aplicaveis(&state.normas, &state.classificacoes).await?;
    Ok(Json(outcome))
}
