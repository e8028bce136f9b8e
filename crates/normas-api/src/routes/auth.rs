//! # Login and Current-User Endpoints
//!
//! `/login` is the only credential-bearing route and sits outside the auth
//! middleware. `/me` echoes the resolved principal back to the client.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use normas_core::{Principal, TipoUsuario};

use crate::auth::{generate_token, token_digest, verify_password};
use crate::config::SESSION_TTL;
use crate::db;
use crate::error::AppError;
use crate::state::AppState;

/// Routes served without authentication.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Routes behind the auth middleware.
pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUser {
    pub id: i64,
    pub username: String,
    pub nome_completo: String,
    #[schema(value_type = String)]
    pub tipo_usuario: TipoUsuario,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Opaque bearer token; present it as `Authorization: Bearer <token>`.
    pub token: String,
    pub user: LoginUser,
}

/// POST /login — authenticate and mint a session token.
///
/// Unknown usernames and wrong passwords return the same message, so the
/// response does not reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing credentials", body = crate::error::ErrorBody),
        (status = 401, description = "Invalid credentials or inactive user", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    body: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AppError> {
    let Some(Json(request)) = body else {
        return Err(AppError::Validation(
            "Username e senha são obrigatórios".to_string(),
        ));
    };
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(AppError::Validation(
            "Username e senha são obrigatórios".to_string(),
        ));
    };
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Username e senha são obrigatórios".to_string(),
        ));
    }

    let credenciais = db::usuarios::find_by_username(&state.normas, &username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Credenciais inválidas".to_string()))?;

    if !credenciais.usuario.ativo {
        return Err(AppError::Unauthorized("Usuário inativo".to_string()));
    }
    if !verify_password(&password, &credenciais.password_hash) {
        return Err(AppError::Unauthorized("Credenciais inválidas".to_string()));
    }

    let now = Utc::now();
    // Opportunistic cleanup keeps the sessions table from growing unbounded.
    let pruned = db::usuarios::prune_expired(&state.normas, now).await?;
    if pruned > 0 {
        tracing::debug!(pruned, "dropped expired sessions");
    }

    let token = generate_token();
    db::usuarios::create_session(
        &state.normas,
        credenciais.usuario.id,
        &token_digest(&token),
        now,
        now + SESSION_TTL,
    )
    .await?;

    tracing::info!(username = %credenciais.usuario.username, "login");

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: credenciais.usuario.id,
            username: credenciais.usuario.username,
            nome_completo: credenciais.usuario.nome_completo,
            tipo_usuario: credenciais.usuario.tipo_usuario,
        },
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[schema(value_type = Object)]
    pub user: Principal,
}

/// GET /me — the authenticated caller's own account.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current principal", body = MeResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub(crate) async fn me(
    Extension(principal): Extension<Principal>,
) -> (StatusCode, Json<MeResponse>) {
    (StatusCode::OK, Json(MeResponse { user: principal }))
}
