use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tidyhome::admin::{
    admin_gate, AdminGate, IdentityError, IdentityProvider, ProfileError, ProfileStore,
    SessionClaims, SessionCookie, SessionCookies, SessionResolution,
};
use tidyhome::config::CacheConfig;
use tidyhome::quotes::{
    admin_quote_router, event_types, CacheTag, Quote, QuoteEvent, QuoteId, QuoteReadCache,
    QuoteStore, StoreError,
};
use tower::ServiceExt;

#[derive(Default)]
struct FixtureStore {
    lookups: AtomicUsize,
}

#[async_trait]
impl QuoteStore for FixtureStore {
    async fn fetch_quote(&self, id: &QuoteId) -> Result<Vec<Quote>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if id.as_str() == "q-1" {
            Ok(vec![Quote::new(id.clone())
                .with_field("price_cents", json!(15900))
                .with_field("client_name", json!("J. Okafor"))])
        } else {
            Ok(Vec::new())
        }
    }

    async fn fetch_quote_events(&self, id: &QuoteId) -> Result<Vec<QuoteEvent>, StoreError> {
        if id.as_str() != "q-1" {
            return Ok(Vec::new());
        }
        let at = |hour| Utc.with_ymd_and_hms(2025, 5, 12, hour, 0, 0).unwrap();
        Ok(vec![
            QuoteEvent {
                id: "e-1".to_string(),
                quote_id: id.clone(),
                created_at: at(8),
                event_type: event_types::CREATED.to_string(),
                actor_type: Some("system".to_string()),
                source: Some("website".to_string()),
                request_id: None,
                diff: None,
            },
            QuoteEvent {
                id: "e-2".to_string(),
                quote_id: id.clone(),
                created_at: at(11),
                event_type: event_types::UPDATED.to_string(),
                actor_type: Some("human".to_string()),
                source: Some("admin".to_string()),
                request_id: Some("req-77".to_string()),
                diff: Some(json!({ "price_cents": { "from": 14900, "to": 15900 } })),
            },
        ])
    }

    async fn recent_quotes(&self, _limit: usize) -> Result<Vec<Quote>, StoreError> {
        Ok(Vec::new())
    }
}

struct CookieIdentity;

#[async_trait]
impl IdentityProvider for CookieIdentity {
    async fn resolve(&self, cookies: &SessionCookies) -> Result<SessionResolution, IdentityError> {
        let subject = match cookies.get("sb-access-token") {
            Some("admin-token") => "admin-1",
            Some("staff-token") => "staff-1",
            _ => return Ok(SessionResolution::anonymous()),
        };
        Ok(SessionResolution {
            claims: Some(SessionClaims {
                subject: Some(subject.to_string()),
                email: None,
            }),
            refreshed: vec![SessionCookie::new("sb-access-token", format!("{subject}-rotated"))],
        })
    }
}

struct StaticProfiles;

#[async_trait]
impl ProfileStore for StaticProfiles {
    async fn superuser_flag(&self, subject: &str) -> Result<Option<bool>, ProfileError> {
        Ok(Some(subject == "admin-1"))
    }
}

fn app(cache: Arc<QuoteReadCache<FixtureStore>>) -> Router {
    let identity: Arc<dyn IdentityProvider> = Arc::new(CookieIdentity);
    let profiles: Arc<dyn ProfileStore> = Arc::new(StaticProfiles);
    admin_quote_router(cache).layer(axum::middleware::from_fn_with_state(
        AdminGate::new(identity, profiles),
        admin_gate::<dyn IdentityProvider, dyn ProfileStore>,
    ))
}

fn cache() -> (Arc<QuoteReadCache<FixtureStore>>, Arc<FixtureStore>) {
    let store = Arc::new(FixtureStore::default());
    let cache = Arc::new(QuoteReadCache::new(store.clone(), CacheConfig::default()));
    (cache, store)
}

fn page_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get("/admin/quotes/q-1");
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("sb-access-token={token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn anonymous_visitor_is_sent_to_login() {
    let (cache, store) = cache();

    let response = app(cache)
        .oneshot(page_request(None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/auth/login?next=%2Fadmin%2Fquotes%2Fq-1")
    );
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn staff_without_superuser_flag_is_sent_home() {
    let (cache, store) = cache();

    let response = app(cache)
        .oneshot(page_request(Some("staff-token")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/")
    );
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn admin_sees_quote_with_newest_event_first() {
    let (cache, _) = cache();

    let response = app(cache)
        .oneshot(page_request(Some("admin-token")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    assert!(cookie
        .as_deref()
        .unwrap_or_default()
        .starts_with("sb-access-token=admin-1-rotated;"));

    let payload = json_body(response).await;
    assert_eq!(payload["quote"]["client_name"], json!("J. Okafor"));
    assert_eq!(payload["events"][0]["id"], json!("e-2"));
    assert_eq!(payload["events"][0]["changed_fields"], json!(["price_cents"]));
    assert_eq!(payload["events"][1]["label"], json!("Created"));
}

#[tokio::test]
async fn repeated_page_views_reuse_the_cached_quote() {
    let (cache, store) = cache();
    let router = app(cache.clone());

    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(page_request(Some("admin-token")))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

    cache.invalidate(&CacheTag::quote("q-1"));
    let response = router
        .oneshot(page_request(Some("admin-token")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
}
