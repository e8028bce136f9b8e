//! # Approval Workflow Endpoints
//!
//! Registering a decision appends to the ledger; the requester name comes
//! from the authenticated principal, never from the request body. History
//! and latest-status reads are authenticated like the rest of the surface.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use normas_core::aprovacao::validar_solicitante;
use normas_core::{Aprovacao, Principal, StatusAprovacao};

use crate::db;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/normas/:id/aprovacao",
            post(registrar_aprovacao).get(historico_aprovacao),
        )
        .route("/normas/:id/aprovacao/status", get(status_aprovacao))
        .route("/aprovacoes/stats", get(aprovacoes_stats))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AprovacaoRequest {
    /// `"aprovado"` or `"recusado"`.
    pub status: Option<String>,
    pub observacao: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AprovacaoRegistrada {
    pub message: String,
    pub id: i64,
    pub norma_id: i64,
    #[schema(value_type = String)]
    pub status: StatusAprovacao,
    pub solicitante: String,
}

/// POST /normas/:id/aprovacao — append an approval or refusal event.
#[utoipa::path(
    post,
    path = "/normas/{id}/aprovacao",
    params(("id" = i64, Path, description = "Norma id")),
    request_body = AprovacaoRequest,
    responses(
        (status = 201, description = "Decision recorded", body = AprovacaoRegistrada),
        (status = 400, description = "Invalid status", body = crate::error::ErrorBody),
        (status = 404, description = "Norma not found", body = crate::error::ErrorBody),
    ),
    tag = "aprovacoes"
)]
pub(crate) async fn registrar_aprovacao(
    State(state): State<AppState>,
    Path(norma_id): Path<i64>,
    Extension(principal): Extension<Principal>,
    body: Option<Json<AprovacaoRequest>>,
) -> Result<(StatusCode, Json<AprovacaoRegistrada>), AppError> {
    let Some(Json(request)) = body else {
        return Err(AppError::Validation("Dados não fornecidos".to_string()));
    };
    let status = request
        .status
        .as_deref()
        .map(StatusAprovacao::from_str)
        .transpose()?
        .ok_or_else(|| {
            AppError::Validation("Status inválido. Use 'aprovado' ou 'recusado'".to_string())
        })?;
    let solicitante = validar_solicitante(&principal.nome_completo)?.to_string();

    if !db::normas::exists(&state.normas, norma_id).await? {
        return Err(AppError::norma_not_found());
    }

    let id = db::aprovacoes::registrar(
        &state.normas,
        norma_id,
        status,
        &solicitante,
        request.observacao.as_deref(),
        Utc::now(),
    )
    .await?;

    tracing::info!(norma_id, %status, solicitante = %solicitante, "approval recorded");

    Ok((
        StatusCode::CREATED,
        Json(AprovacaoRegistrada {
            message: format!("Norma {status} com sucesso"),
            id,
            norma_id,
            status,
            solicitante,
        }),
    ))
}

/// GET /normas/:id/aprovacao — full decision history, newest first.
#[utoipa::path(
    get,
    path = "/normas/{id}/aprovacao",
    params(("id" = i64, Path, description = "Norma id")),
    responses((status = 200, description = "Decision history", body = Vec<Object>)),
    tag = "aprovacoes"
)]
pub(crate) async fn historico_aprovacao(
    State(state): State<AppState>,
    Path(norma_id): Path<i64>,
) -> Result<Json<Vec<Aprovacao>>, AppError> {
    Ok(Json(db::aprovacoes::historico(&state.normas, norma_id).await?))
}

/// GET /normas/:id/aprovacao/status — the latest decision, or
/// `{"status": null}` when the norma has no history.
#[utoipa::path(
    get,
    path = "/normas/{id}/aprovacao/status",
    params(("id" = i64, Path, description = "Norma id")),
    responses((status = 200, description = "Latest decision", body = Object)),
    tag = "aprovacoes"
)]
pub(crate) async fn status_aprovacao(
    State(state): State<AppState>,
    Path(norma_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    match db::aprovacoes::ultimo_status(&state.normas, norma_id).await? {
        Some(ultimo) => Ok(Json(serde_json::to_value(ultimo).map_err(|e| {
            AppError::Internal(format!("falha ao serializar status: {e}"))
        })?)),
        None => Ok(Json(json!({ "status": null }))),
    }
}

/// GET /aprovacoes/stats — ledger aggregations.
#[utoipa::path(
    get,
    path = "/aprovacoes/stats",
    responses((status = 200, description = "Ledger statistics", body = Object)),
    tag = "aprovacoes"
)]
pub(crate) async fn aprovacoes_stats(
    State(state): State<AppState>,
) -> Result<Json<db::aprovacoes::AprovacoesStats>, AppError> {
    Ok(Json(db::aprovacoes::stats(&state.normas).await?))
}
