//! # normas-api — Catálogo de Normas HTTP Service
//!
//! Axum service over two SQLite stores: the norma catalogue (documents,
//! approval ledger, users, sessions) and the externally produced
//! management-systems classification dataset.
//!
//! ## API Surface
//!
//! | Prefix                     | Module                  | Access        |
//! |----------------------------|-------------------------|---------------|
//! | `/health`, `/login`        | [`routes::auth`]        | public        |
//! | `/metrics`, `/openapi.json`| [`middleware`], [`openapi`] | public    |
//! | `/me`                      | [`routes::auth`]        | authenticated |
//! | `/normas/*`                | [`routes::normas`]      | authenticated |
//! | `/normas/:id/aprovacao*`, `/aprovacoes/*` | [`routes::aprovacoes`] | authenticated |
//! | `/usuarios/*`              | [`routes::usuarios`]    | admin         |
//!
//! ## Middleware stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod sync;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router.
///
/// `/health`, `/login`, `/openapi.json` and `/metrics` are mounted outside
/// the auth middleware so they remain reachable without credentials.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let metrics_on = config::metrics_enabled();

    let mut api = Router::new()
        .merge(routes::auth::router())
        .merge(routes::normas::router())
        .merge(routes::aprovacoes::router())
        .merge(routes::usuarios::router())
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    if metrics_on {
        api = api
            .layer(axum::middleware::from_fn(
                middleware::metrics::metrics_middleware,
            ))
            .layer(Extension(metrics.clone()));
    }

    let api = api.layer(TraceLayer::new_for_http()).with_state(state.clone());

    let mut public = Router::new()
        .route("/health", get(health))
        .merge(routes::auth::public_router())
        .merge(openapi::router());

    if metrics_on {
        public = public
            .route("/metrics", get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let public = public.with_state(state);

    Router::new().merge(public).merge(api)
}

/// GET /health — liveness probe, always 200 while the process runs.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "API is running" }))
}

/// GET /metrics — Prometheus scrape endpoint.
///
/// Domain gauges are refreshed from the stores on each scrape (pull model),
/// then the whole registry is encoded in text exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    async fn gauge(pool: &sqlx::SqlitePool, query: &str) -> Option<i64> {
        match sqlx::query_scalar(query).fetch_one(pool).await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "metrics gauge query failed");
                None
            }
        }
    }

    if let Some(v) = gauge(&state.normas, "SELECT COUNT(*) FROM tb_normas_consolidadas").await {
        metrics.normas_total().set(v as f64);
    }
    if let Some(v) = gauge(
        &state.normas,
        "SELECT COUNT(*) FROM tb_normas_consolidadas WHERE aplicavel = 1",
    )
    .await
    {
        metrics.normas_aplicaveis().set(v as f64);
    }
    if let Some(v) = gauge(&state.normas, "SELECT COUNT(*) FROM tb_normas_aprovacoes").await {
        metrics.aprovacoes_total().set(v as f64);
    }
    if let Some(v) = gauge(
        &state.normas,
        "SELECT COUNT(*) FROM tb_usuarios WHERE ativo = 1",
    )
    .await
    {
        metrics.usuarios_ativos().set(v as f64);
    }

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}
