use crate::infra::{AppState, DynAdminGate};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tidyhome::admin::{admin_gate, IdentityProvider, ProfileStore};
use tidyhome::quotes::{admin_quote_router, invalidation_router, QuoteReadCache, QuoteStore};

/// Gated admin pages, the invalidation hook and the operational endpoints.
pub(crate) fn with_quote_routes<S>(
    cache: Arc<QuoteReadCache<S>>,
    gate: DynAdminGate,
    revalidate_secret: Option<String>,
) -> Router
where
    S: QuoteStore + 'static,
{
    let admin = admin_quote_router(cache.clone()).layer(axum::middleware::from_fn_with_state(
        gate,
        admin_gate::<dyn IdentityProvider, dyn ProfileStore>,
    ));

    admin
        .merge(invalidation_router(cache, revalidate_secret))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
