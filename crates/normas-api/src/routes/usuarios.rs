//! # User Management Endpoints (Admin)
//!
//! The whole family is gated by a `require_admin` route layer composed in
//! `router()` — the admin check is middleware, not per-handler, so a new
//! route added here cannot forget it.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use normas_core::{Principal, TipoUsuario, Usuario};

use crate::auth::{hash_password, require_admin};
use crate::db;
use crate::db::usuarios::UsuarioUpdate;
use crate::error::AppError;
use crate::routes::normas::MessageResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/usuarios", get(list_usuarios).post(create_usuario))
        .route(
            "/usuarios/:id",
            axum::routing::put(update_usuario).delete(delete_usuario),
        )
        .route("/usuarios/:id/aprovacoes", get(usuario_aprovacoes))
        .route_layer(from_fn(require_admin))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsuariosResponse {
    #[schema(value_type = Vec<Object>)]
    pub usuarios: Vec<Usuario>,
}

/// GET /usuarios — every account, hash-free.
#[utoipa::path(
    get,
    path = "/usuarios",
    responses(
        (status = 200, description = "All accounts", body = UsuariosResponse),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
    ),
    tag = "usuarios"
)]
pub(crate) async fn list_usuarios(
    State(state): State<AppState>,
) -> Result<Json<UsuariosResponse>, AppError> {
    let usuarios = db::usuarios::list(&state.normas).await?;
    Ok(Json(UsuariosResponse { usuarios }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUsuarioRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub nome_completo: Option<String>,
    /// Defaults to `"user"`.
    pub tipo_usuario: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsuarioResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub usuario: Usuario,
}

/// POST /usuarios — create an account.
#[utoipa::path(
    post,
    path = "/usuarios",
    request_body = CreateUsuarioRequest,
    responses(
        (status = 201, description = "Account created", body = UsuarioResponse),
        (status = 400, description = "Missing fields, bad role, or duplicate username", body = crate::error::ErrorBody),
    ),
    tag = "usuarios"
)]
pub(crate) async fn create_usuario(
    State(state): State<AppState>,
    body: Option<Json<CreateUsuarioRequest>>,
) -> Result<(StatusCode, Json<UsuarioResponse>), AppError> {
    let Some(Json(request)) = body else {
        return Err(AppError::Validation(
            "Username, senha e nome completo são obrigatórios".to_string(),
        ));
    };
    let (Some(username), Some(password), Some(nome_completo)) =
        (request.username, request.password, request.nome_completo)
    else {
        return Err(AppError::Validation(
            "Username, senha e nome completo são obrigatórios".to_string(),
        ));
    };
    if username.is_empty() || password.is_empty() || nome_completo.is_empty() {
        return Err(AppError::Validation(
            "Username, senha e nome completo são obrigatórios".to_string(),
        ));
    }

    let tipo_usuario = match request.tipo_usuario.as_deref() {
        None => TipoUsuario::User,
        Some(raw) => TipoUsuario::from_str(raw)
            .map_err(|_| AppError::Validation("Tipo de usuário inválido".to_string()))?,
    };

    if db::usuarios::username_exists(&state.normas, &username).await? {
        return Err(AppError::Validation("Username já existe".to_string()));
    }

    let password_hash = hash_password(&password)?;
    let id = db::usuarios::create(
        &state.normas,
        &username,
        &password_hash,
        &nome_completo,
        tipo_usuario,
        Utc::now(),
    )
    .await?;

    let usuario = db::usuarios::find_by_id(&state.normas, id)
        .await?
        .ok_or_else(|| AppError::Internal("usuário recém-criado não encontrado".to_string()))?;

    tracing::info!(id, username = %usuario.username, "user created");

    Ok((
        StatusCode::CREATED,
        Json(UsuarioResponse {
            message: "Usuário criado com sucesso".to_string(),
            usuario,
        }),
    ))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUsuarioRequest {
    pub nome_completo: Option<String>,
    pub tipo_usuario: Option<String>,
    pub ativo: Option<bool>,
    /// Blank passwords are ignored, matching the original admin UI.
    pub password: Option<String>,
}

/// PUT /usuarios/:id — partial account update.
#[utoipa::path(
    put,
    path = "/usuarios/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUsuarioRequest,
    responses(
        (status = 200, description = "Account updated", body = UsuarioResponse),
        (status = 400, description = "Bad role or nothing to update", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
    ),
    tag = "usuarios"
)]
pub(crate) async fn update_usuario(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    body: Option<Json<UpdateUsuarioRequest>>,
) -> Result<Json<UsuarioResponse>, AppError> {
    let Some(Json(request)) = body else {
        return Err(AppError::Validation(
            "Nenhum campo para atualizar".to_string(),
        ));
    };

    if db::usuarios::find_by_id(&state.normas, user_id).await?.is_none() {
        return Err(AppError::NotFound("Usuário não encontrado".to_string()));
    }

    let tipo_usuario = request
        .tipo_usuario
        .as_deref()
        .map(TipoUsuario::from_str)
        .transpose()
        .map_err(|_| AppError::Validation("Tipo de usuário inválido".to_string()))?;

    let password_hash = match request.password.as_deref() {
        Some(password) if !password.is_empty() => Some(hash_password(password)?),
        _ => None,
    };

    let changes = UsuarioUpdate {
        nome_completo: request.nome_completo.as_deref(),
        password_hash: password_hash.as_deref(),
        tipo_usuario,
        ativo: request.ativo,
    };
    if changes.is_empty() {
        return Err(AppError::Validation(
            "Nenhum campo para atualizar".to_string(),
        ));
    }

    db::usuarios::update(&state.normas, user_id, &changes).await?;

    let usuario = db::usuarios::find_by_id(&state.normas, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("usuário desapareceu durante a atualização".to_string()))?;

    Ok(Json(UsuarioResponse {
        message: "Usuário atualizado com sucesso".to_string(),
        usuario,
    }))
}

/// DELETE /usuarios/:id — remove an account; self-deletion is rejected.
#[utoipa::path(
    delete,
    path = "/usuarios/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 400, description = "Attempted self-delete", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
    ),
    tag = "usuarios"
)]
pub(crate) async fn delete_usuario(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<MessageResponse>, AppError> {
    if principal.id == user_id {
        return Err(AppError::Validation(
            "Não é possível deletar seu próprio usuário".to_string(),
        ));
    }

    if !db::usuarios::delete(&state.normas, user_id).await? {
        return Err(AppError::NotFound("Usuário não encontrado".to_string()));
    }
    tracing::info!(user_id, "user deleted");
    Ok(Json(MessageResponse {
        message: "Usuário deletado com sucesso".to_string(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsuarioResumo {
    pub id: i64,
    pub nome_completo: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsuarioAprovacoesResponse {
    pub usuario: UsuarioResumo,
    #[schema(value_type = Vec<Object>)]
    pub aprovacoes: Vec<db::aprovacoes::AprovacaoComNorma>,
}

/// GET /usuarios/:id/aprovacoes — every decision this user registered,
/// matched by their full name (the ledger stores names, not ids).
#[utoipa::path(
    get,
    path = "/usuarios/{id}/aprovacoes",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User's decisions", body = UsuarioAprovacoesResponse),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
    ),
    tag = "usuarios"
)]
pub(crate) async fn usuario_aprovacoes(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UsuarioAprovacoesResponse>, AppError> {
    let usuario = db::usuarios::find_by_id(&state.normas, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuário não encontrado".to_string()))?;

    let aprovacoes =
        db::aprovacoes::por_solicitante(&state.normas, &usuario.nome_completo).await?;

    Ok(Json(UsuarioAprovacoesResponse {
        usuario: UsuarioResumo {
            id: usuario.id,
            nome_completo: usuario.nome_completo,
        },
        aprovacoes,
    }))
}
