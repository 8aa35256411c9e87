//! Quote records, their audit trail, and the read-through cache the admin pages
//! use to look them up.

pub mod cache;
pub mod domain;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use cache::{CacheKey, CacheTag, Clock, QueryKind, SystemClock, TaggedCache};
pub use domain::{event_types, sort_newest_first, Quote, QuoteEvent, QuoteId};
pub use router::{
    admin_quote_router, invalidation_router, QuoteDetailView, QuoteEventView,
    REVALIDATE_SECRET_HEADER,
};
pub use service::{QuoteReadCache, QuoteReadError};
pub use store::{QuoteStore, StoreError};
