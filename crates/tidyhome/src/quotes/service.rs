use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::cache::{CacheKey, CacheTag, Clock, QueryKind, SystemClock, TaggedCache};
use super::domain::{sort_newest_first, Quote, QuoteEvent, QuoteId};
use super::store::{QuoteStore, StoreError};
use crate::config::CacheConfig;

/// Read-through cache over the quote store.
///
/// Found quotes, not-found results and event lists are cached for the freshness
/// window under their tags. Store failures are returned to the caller and never
/// cached.
pub struct QuoteReadCache<S> {
    store: Arc<S>,
    quotes: TaggedCache<Option<Quote>>,
    events: TaggedCache<Vec<QuoteEvent>>,
    lists: TaggedCache<Vec<Quote>>,
    ttl: Duration,
}

impl<S> QuoteReadCache<S>
where
    S: QuoteStore + 'static,
{
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            quotes: TaggedCache::new(clock.clone()),
            events: TaggedCache::new(clock.clone()),
            lists: TaggedCache::new(clock),
            ttl: config.ttl,
        }
    }

    /// Fetch a single quote, expecting exactly one match.
    pub async fn get_quote(&self, id: &QuoteId) -> Result<Quote, QuoteReadError> {
        let key = CacheKey::new(QueryKind::Quote, id.as_str());
        let tags = [CacheTag::quote(id.as_str())];

        let cached = self
            .quotes
            .get_or_populate(key, &tags, self.ttl, move || async move {
                match self.store.fetch_quote(id).await {
                    Ok(mut rows) if rows.len() <= 1 => Ok(rows.pop()),
                    Ok(rows) => Err(QuoteReadError::Ambiguous {
                        id: id.clone(),
                        matches: rows.len(),
                    }),
                    Err(err) => {
                        warn!(quote_id = %id, error = %err, "quote lookup failed");
                        Err(QuoteReadError::Store(err))
                    }
                }
            })
            .await?;

        cached.ok_or_else(|| QuoteReadError::NotFound(id.clone()))
    }

    /// Fetch the audit trail for a quote, newest first. Zero events is not an error.
    pub async fn get_quote_events(&self, id: &QuoteId) -> Result<Vec<QuoteEvent>, QuoteReadError> {
        let key = CacheKey::new(QueryKind::QuoteEvents, id.as_str());
        let tags = [CacheTag::quote_events(id.as_str())];

        self.events
            .get_or_populate(key, &tags, self.ttl, move || async move {
                match self.store.fetch_quote_events(id).await {
                    Ok(mut events) => {
                        sort_newest_first(&mut events);
                        Ok(events)
                    }
                    Err(err) => {
                        warn!(quote_id = %id, error = %err, "quote events lookup failed");
                        Err(QuoteReadError::Store(err))
                    }
                }
            })
            .await
    }

    /// Most recent quotes for the admin index, cached under `quotes:list`.
    pub async fn list_quotes(&self, limit: usize) -> Result<Vec<Quote>, QuoteReadError> {
        let key = CacheKey::new(QueryKind::QuoteList, format!("list:{limit}"));
        let tags = [CacheTag::quotes_list()];

        self.lists
            .get_or_populate(key, &tags, self.ttl, move || async move {
                match self.store.recent_quotes(limit).await {
                    Ok(quotes) => Ok(quotes),
                    Err(err) => {
                        warn!(limit, error = %err, "quote list lookup failed");
                        Err(QuoteReadError::Store(err))
                    }
                }
            })
            .await
    }

    /// Remove every cached read carrying `tag`.
    pub fn invalidate(&self, tag: &CacheTag) -> usize {
        let removed =
            self.quotes.invalidate(tag) + self.events.invalidate(tag) + self.lists.invalidate(tag);
        debug!(tag = %tag, removed, "cache tag invalidated");
        removed
    }

    /// Invalidate everything a write to `id` can affect.
    pub fn invalidate_quote(&self, id: &QuoteId) -> usize {
        [
            CacheTag::quote(id.as_str()),
            CacheTag::quote_events(id.as_str()),
            CacheTag::quotes_list(),
        ]
        .iter()
        .map(|tag| self.invalidate(tag))
        .sum()
    }

    pub fn cached_entries(&self) -> usize {
        self.quotes.len() + self.events.len() + self.lists.len()
    }
}

/// Error returned by the quote read operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteReadError {
    #[error("quote {0} not found")]
    NotFound(QuoteId),
    #[error("quote {id} matched {matches} records")]
    Ambiguous { id: QuoteId, matches: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QuoteReadError {
    /// Not-found and ambiguous lookups both render as a missing quote.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QuoteReadError::NotFound(_) | QuoteReadError::Ambiguous { .. }
        )
    }
}
