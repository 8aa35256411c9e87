use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::info;

use super::cache::CacheTag;
use super::domain::{Quote, QuoteEvent, QuoteId};
use super::service::QuoteReadCache;
use super::store::QuoteStore;

/// Header writers present to prove they may invalidate cached reads.
pub const REVALIDATE_SECRET_HEADER: &str = "x-revalidate-secret";

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

/// Router builder exposing the quote review pages under `/admin`.
///
/// The admin gate is layered on by the caller so these handlers can assume an
/// authorized staff member.
pub fn admin_quote_router<S>(cache: Arc<QuoteReadCache<S>>) -> Router
where
    S: QuoteStore + 'static,
{
    Router::new()
        .route("/admin/quotes", get(list_handler::<S>))
        .route("/admin/quotes/:quote_id", get(detail_handler::<S>))
        .with_state(cache)
}

/// Router builder for the writer-facing invalidation hook.
pub fn invalidation_router<S>(cache: Arc<QuoteReadCache<S>>, secret: Option<String>) -> Router
where
    S: QuoteStore + 'static,
{
    Router::new()
        .route("/internal/cache/invalidate", post(invalidate_handler::<S>))
        .with_state(InvalidationState {
            cache,
            secret: secret.map(Arc::from),
        })
}

pub(crate) struct InvalidationState<S> {
    pub(crate) cache: Arc<QuoteReadCache<S>>,
    pub(crate) secret: Option<Arc<str>>,
}

impl<S> Clone for InvalidationState<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Timeline entry rendered on the quote detail page.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteEventView {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub event_type: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub changed_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Value>,
}

impl From<&QuoteEvent> for QuoteEventView {
    fn from(event: &QuoteEvent) -> Self {
        Self {
            id: event.id.clone(),
            created_at: event.created_at,
            event_type: event.event_type.clone(),
            label: event.label().to_string(),
            actor_type: event.actor_type.clone(),
            source: event.source.clone(),
            request_id: event.request_id.clone(),
            changed_fields: event
                .changed_fields()
                .into_iter()
                .map(str::to_string)
                .collect(),
            diff: event.diff.clone(),
        }
    }
}

/// Payload behind `/admin/quotes/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteDetailView {
    pub quote_id: QuoteId,
    pub quote: Option<Quote>,
    pub events: Vec<QuoteEventView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InvalidateRequest {
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) quote_id: Option<String>,
}

pub(crate) async fn detail_handler<S>(
    State(cache): State<Arc<QuoteReadCache<S>>>,
    Path(quote_id): Path<String>,
) -> Response
where
    S: QuoteStore + 'static,
{
    let Some(id) = QuoteId::parse(&quote_id) else {
        let payload = json!({ "error": "quote id must not be empty" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    let (quote, events) = tokio::join!(cache.get_quote(&id), cache.get_quote_events(&id));

    let (events, events_error) = match events {
        Ok(events) => (events.iter().map(QuoteEventView::from).collect(), None),
        Err(err) => (Vec::new(), Some(err.to_string())),
    };

    let (status, quote, error) = match quote {
        Ok(quote) => (StatusCode::OK, Some(quote), None),
        Err(err) if err.is_not_found() => (StatusCode::NOT_FOUND, None, Some(err.to_string())),
        Err(err) => (StatusCode::BAD_GATEWAY, None, Some(err.to_string())),
    };

    let view = QuoteDetailView {
        quote_id: id,
        quote,
        events,
        error,
        events_error,
    };
    (status, axum::Json(view)).into_response()
}

pub(crate) async fn list_handler<S>(
    State(cache): State<Arc<QuoteReadCache<S>>>,
    Query(params): Query<ListParams>,
) -> Response
where
    S: QuoteStore + 'static,
{
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    match cache.list_quotes(limit).await {
        Ok(quotes) => {
            let payload = json!({ "quotes": quotes, "limit": limit });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => {
            let payload = json!({ "quotes": [], "limit": limit, "error": err.to_string() });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn invalidate_handler<S>(
    State(state): State<InvalidationState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: QuoteStore + 'static,
{
    let Some(secret) = state.secret.as_deref() else {
        let payload = json!({ "error": "cache invalidation is disabled" });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };

    let authorized = headers
        .get(REVALIDATE_SECRET_HEADER)
        .map(|value| bool::from(value.as_bytes().ct_eq(secret.as_bytes())))
        .unwrap_or(false);
    if !authorized {
        let payload = json!({ "error": "invalid revalidation secret" });
        return (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response();
    }

    let request: InvalidateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            let payload = json!({ "error": format!("invalid invalidation request: {err}") });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    let mut tags: Vec<CacheTag> = request
        .tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(|tag| CacheTag(tag.to_string()))
        .collect();
    if let Some(id) = request.quote_id.as_deref().and_then(QuoteId::parse) {
        tags.push(CacheTag::quote(id.as_str()));
        tags.push(CacheTag::quote_events(id.as_str()));
        tags.push(CacheTag::quotes_list());
    }
    tags.sort();
    tags.dedup();

    if tags.is_empty() {
        let payload = json!({ "error": "provide at least one tag or a quote_id" });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    let invalidated: usize = tags.iter().map(|tag| state.cache.invalidate(tag)).sum();
    info!(tags = ?tags, invalidated, "cache tags invalidated by writer");

    let payload = json!({ "tags": tags, "invalidated": invalidated });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

