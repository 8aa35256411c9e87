use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Time source for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Query families sharing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Quote,
    QuoteEvents,
    QuoteList,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Quote => "quote",
            QueryKind::QuoteEvents => "quote_events",
            QueryKind::QuoteList => "quotes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: QueryKind,
    pub id: String,
}

impl CacheKey {
    pub fn new(query: QueryKind, id: impl Into<String>) -> Self {
        Self {
            query,
            id: id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.query.as_str(), self.id)
    }
}

/// Invalidation label stored alongside each entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheTag(pub String);

impl CacheTag {
    pub fn quote(id: &str) -> Self {
        Self(format!("quote:{id}"))
    }

    pub fn quote_events(id: &str) -> Self {
        Self(format!("quote:{id}:events"))
    }

    pub fn quotes_list() -> Self {
        Self("quotes:list".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    tags: BTreeSet<CacheTag>,
}

struct CacheState<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    // Per-tag invalidation counter, compared before a fill is stored.
    generations: HashMap<CacheTag, u64>,
}

impl<V> CacheState<V> {
    fn generation(&self, tag: &CacheTag) -> u64 {
        self.generations.get(tag).copied().unwrap_or(0)
    }

    fn snapshot(&self, tags: &[CacheTag]) -> Vec<u64> {
        tags.iter().map(|tag| self.generation(tag)).collect()
    }

    fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.entries
            .retain(|_, entry| is_fresh(now, entry.inserted_at, ttl));
    }
}

/// Key/value store with per-entry insertion time and tag set.
///
/// Entries are dropped once read after the freshness window, swept on every
/// populate, and removed when any of their tags is invalidated. Concurrent misses
/// for the same key may each run the fetcher; the last completed write wins, but
/// a fill that started before an invalidation of one of its tags is not stored.
pub struct TaggedCache<V> {
    state: Mutex<CacheState<V>>,
    clock: Arc<dyn Clock>,
}

fn is_fresh(now: DateTime<Utc>, inserted_at: DateTime<Utc>, ttl: Duration) -> bool {
    now.signed_duration_since(inserted_at)
        .to_std()
        .map(|age| age < ttl)
        .unwrap_or(false)
}

impl<V> TaggedCache<V>
where
    V: Clone + Send,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                generations: HashMap::new(),
            }),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value for `key` if it was stored less than `ttl` ago. A stale entry
    /// is removed on the way out.
    pub fn get_fresh(&self, key: &CacheKey, ttl: Duration) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.state();
        let entry = state.entries.get(key)?;
        if is_fresh(now, entry.inserted_at, ttl) {
            return Some(entry.value.clone());
        }
        state.entries.remove(key);
        None
    }

    pub fn insert(&self, key: CacheKey, value: V, tags: &[CacheTag]) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
            tags: tags.iter().cloned().collect(),
        };
        self.state().entries.insert(key, entry);
    }

    /// Return the fresh cached value or run `fetcher` and store its `Ok` output.
    ///
    /// Errors are handed back to the caller without touching the cache, so the
    /// next read goes to the store again. A value fetched while one of `tags` was
    /// invalidated is returned but not stored.
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        key: CacheKey,
        tags: &[CacheTag],
        ttl: Duration,
        fetcher: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get_fresh(&key, ttl) {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }

        debug!(key = %key, "cache miss");
        let snapshot = self.state().snapshot(tags);
        let value = fetcher().await?;

        let now = self.clock.now();
        let mut state = self.state();
        if state.snapshot(tags) != snapshot {
            debug!(key = %key, "tag invalidated during fetch, not caching");
            return Ok(value);
        }

        state.sweep(now, ttl);
        state.entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                inserted_at: now,
                tags: tags.iter().cloned().collect(),
            },
        );
        Ok(value)
    }

    /// Drop every entry carrying `tag`, returning how many were removed.
    pub fn invalidate(&self, tag: &CacheTag) -> usize {
        let mut state = self.state();
        let generation = state.generations.entry(tag.clone()).or_insert(0);
        *generation = generation.wrapping_add(1);

        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.tags.contains(tag));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }
}
