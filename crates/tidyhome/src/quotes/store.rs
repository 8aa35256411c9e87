use async_trait::async_trait;

use super::domain::{Quote, QuoteEvent, QuoteId};

/// Read surface of the backing store consumed by the quote cache.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Point lookup by primary key. Returns every matching row so the caller can
    /// tell "none" from "more than one".
    async fn fetch_quote(&self, id: &QuoteId) -> Result<Vec<Quote>, StoreError>;

    /// All events for a quote, newest first.
    async fn fetch_quote_events(&self, id: &QuoteId) -> Result<Vec<QuoteEvent>, StoreError>;

    /// Most recently created quotes for the admin index.
    async fn recent_quotes(&self, limit: usize) -> Result<Vec<Quote>, StoreError>;
}

/// Failure reported by a backing store query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected payload: {0}")]
    Decode(String),
}
