//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Opaque bearer token obtained from POST /login.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the whole API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catálogo de Normas API",
        version = "0.3.2",
        description = "Catalogue of regulatory documents (normas ambientais):\n\
            filtered and paginated queries with derived approval status,\n\
            append-only approval workflow, applicability reconciliation\n\
            against the management-systems classification dataset, and\n\
            admin user management.\n\n\
            Authentication: `Authorization: Bearer <token>` from POST /login.\n\
            `/health`, `/login`, `/metrics` and `/openapi.json` are public.",
        license(name = "AGPL-3.0-or-later"),
    ),
    servers(
        (url = "http://localhost:5001", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::auth::login,
        crate::routes::auth::me,
        crate::routes::normas::list_normas,
        crate::routes::normas::list_aplicaveis,
        crate::routes::normas::get_norma,
        crate::routes::normas::create_norma,
        crate::routes::normas::update_norma,
        crate::routes::normas::delete_norma,
        crate::routes::normas::stats,
        crate::routes::normas::filtros_valores,
        crate::routes::normas::sync_aplicavel,
        crate::routes::normas::norma_management_systems,
        crate::routes::aprovacoes::registrar_aprovacao,
        crate::routes::aprovacoes::historico_aprovacao,
        crate::routes::aprovacoes::status_aprovacao,
        crate::routes::aprovacoes::aprovacoes_stats,
        crate::routes::usuarios::list_usuarios,
        crate::routes::usuarios::create_usuario,
        crate::routes::usuarios::update_usuario,
        crate::routes::usuarios::delete_usuario,
        crate::routes::usuarios::usuario_aprovacoes,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::auth::LoginRequest,
        crate::routes::auth::LoginUser,
        crate::routes::auth::LoginResponse,
        crate::routes::auth::MeResponse,
        crate::routes::normas::NormasQuery,
        crate::routes::normas::NormasPage,
        crate::routes::normas::CreatedResponse,
        crate::routes::normas::NormaComClassificacoes,
        crate::routes::normas::MessageResponse,
        crate::routes::aprovacoes::AprovacaoRequest,
        crate::routes::aprovacoes::AprovacaoRegistrada,
        crate::routes::usuarios::UsuariosResponse,
        crate::routes::usuarios::CreateUsuarioRequest,
        crate::routes::usuarios::UpdateUsuarioRequest,
        crate::routes::usuarios::UsuarioResponse,
        crate::routes::usuarios::UsuarioResumo,
        crate::routes::usuarios::UsuarioAprovacoesResponse,
    )),
    tags(
        (name = "auth", description = "Login and session identity"),
        (name = "normas", description = "Catalogue queries and mutations"),
        (name = "aprovacoes", description = "Approval workflow ledger"),
        (name = "usuarios", description = "Admin user management"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Serve the generated spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
