use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::config::CacheConfig;
use crate::quotes::cache::Clock;
use crate::quotes::domain::{event_types, Quote, QuoteEvent, QuoteId};
use crate::quotes::service::QuoteReadCache;
use crate::quotes::store::{QuoteStore, StoreError};

/// Clock the tests move by hand.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap()),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex");
        *guard += chrono::Duration::from_std(by).expect("duration fits");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex")
    }
}

/// Store double that counts every query it answers.
#[derive(Default)]
pub(super) struct CountingStore {
    quotes: Mutex<Vec<Quote>>,
    events: Mutex<HashMap<QuoteId, Vec<QuoteEvent>>>,
    failing: AtomicBool,
    quote_calls: AtomicUsize,
    event_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl CountingStore {
    pub(super) fn with_quotes(quotes: Vec<Quote>) -> Self {
        let store = Self::default();
        *store.quotes.lock().expect("store mutex") = quotes;
        store
    }

    pub(super) fn put_quote(&self, quote: Quote) {
        self.quotes.lock().expect("store mutex").push(quote);
    }

    /// Swap the stored row for `quote.id`, as a writer updating the record would.
    pub(super) fn replace_quote(&self, quote: Quote) {
        let mut quotes = self.quotes.lock().expect("store mutex");
        quotes.retain(|existing| existing.id != quote.id);
        quotes.push(quote);
    }

    pub(super) fn set_events(&self, id: &QuoteId, events: Vec<QuoteEvent>) {
        self.events
            .lock()
            .expect("store mutex")
            .insert(id.clone(), events);
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub(super) fn event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }

    pub(super) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QuoteStore for CountingStore {
    async fn fetch_quote(&self, id: &QuoteId) -> Result<Vec<Quote>, StoreError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .quotes
            .lock()
            .expect("store mutex")
            .iter()
            .filter(|quote| &quote.id == id)
            .cloned()
            .collect())
    }

    async fn fetch_quote_events(&self, id: &QuoteId) -> Result<Vec<QuoteEvent>, StoreError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .events
            .lock()
            .expect("store mutex")
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_quotes(&self, limit: usize) -> Result<Vec<Quote>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .quotes
            .lock()
            .expect("store mutex")
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Store whose next quote lookup reads its rows, then parks until released.
pub(super) struct PausingStore {
    pub(super) inner: CountingStore,
    pause_next: AtomicBool,
    paused: Notify,
    resume: Notify,
}

impl PausingStore {
    pub(super) fn with_quotes(quotes: Vec<Quote>) -> Self {
        Self {
            inner: CountingStore::with_quotes(quotes),
            pause_next: AtomicBool::new(true),
            paused: Notify::new(),
            resume: Notify::new(),
        }
    }

    pub(super) async fn wait_until_paused(&self) {
        self.paused.notified().await;
    }

    pub(super) fn resume(&self) {
        self.resume.notify_one();
    }
}

#[async_trait]
impl QuoteStore for PausingStore {
    async fn fetch_quote(&self, id: &QuoteId) -> Result<Vec<Quote>, StoreError> {
        let rows = self.inner.fetch_quote(id).await?;
        if self.pause_next.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.resume.notified().await;
        }
        Ok(rows)
    }

    async fn fetch_quote_events(&self, id: &QuoteId) -> Result<Vec<QuoteEvent>, StoreError> {
        self.inner.fetch_quote_events(id).await
    }

    async fn recent_quotes(&self, limit: usize) -> Result<Vec<Quote>, StoreError> {
        self.inner.recent_quotes(limit).await
    }
}

pub(super) fn quote_id(raw: &str) -> QuoteId {
    QuoteId(raw.to_string())
}

pub(super) fn quote(raw_id: &str, price_cents: i64) -> Quote {
    Quote::new(quote_id(raw_id))
        .with_field("price_cents", json!(price_cents))
        .with_field("status", json!("sent"))
        .with_field("service", json!({ "kind": "deep_clean", "rooms": 4 }))
}

pub(super) fn event(id: &str, quote: &str, minute: u32, event_type: &str) -> QuoteEvent {
    QuoteEvent {
        id: id.to_string(),
        quote_id: quote_id(quote),
        created_at: Utc.with_ymd_and_hms(2025, 3, 30, 14, minute, 0).unwrap(),
        event_type: event_type.to_string(),
        actor_type: Some("human".to_string()),
        source: Some("admin".to_string()),
        request_id: Some(format!("req-{id}")),
        diff: Some(json!({ "status": { "from": "draft", "to": "sent" } })),
    }
}

pub(super) fn audit_trail(quote: &str) -> Vec<QuoteEvent> {
    vec![
        event("e-2", quote, 20, event_types::STATUS_CHANGED),
        event("e-1", quote, 5, event_types::CREATED),
        event("e-3", quote, 45, event_types::UPDATED),
    ]
}

pub(super) fn build_cache(
    store: Arc<CountingStore>,
    ttl: Duration,
) -> (QuoteReadCache<CountingStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = QuoteReadCache::with_clock(store, CacheConfig { ttl }, clock.clone());
    (cache, clock)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
