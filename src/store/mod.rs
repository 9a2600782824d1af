//! Listing stores
//!
//! This module defines the `ListingStore` trait the feed reads from, the
//! change events it delivers, and the store implementations:
//! - `memory`: in-process table with change fan-out
//! - `rest`: hosted table store over its REST interface, with a polling change feed

pub mod memory;
pub mod rest;

pub use memory::MemoryListingStore;
pub use rest::RestListingStore;

use crate::error::{Error, Result};
use crate::listing::{Listing, ListingFilter, NewListing};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A row change delivered by a subscription
///
/// `Delete` carries the last known state of the removed row.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Listing),
    Update(Listing),
    Delete(Listing),
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete(_) => ChangeKind::Delete,
        }
    }

    pub fn listing(&self) -> &Listing {
        match self {
            Self::Insert(listing) | Self::Update(listing) | Self::Delete(listing) => listing,
        }
    }
}

/// Receiving end of a subscription's events
///
/// A store closes the sink (drops its sender) when the subscription is lost.
pub type EventSink = mpsc::UnboundedSender<ChangeEvent>;

/// Handle to a live subscription
///
/// Disposing stops further deliveries. Disposal is idempotent and also
/// happens on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the store-specific teardown
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop deliveries
    pub fn dispose(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Trait for durable listing tables
///
/// Implementations must be thread-safe (Send + Sync) to be shared between
/// feeds and the HTTP server.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Short name for logs (e.g., "memory", "rest")
    fn name(&self) -> &'static str;

    /// All rows matching `filter`, in no particular order
    async fn query_snapshot(&self, filter: &ListingFilter) -> Result<Vec<Listing>>;

    /// Deliver changes to rows matching `filter` into `sink`
    ///
    /// Delivery is at-least-once. The subscription lives until disposed or
    /// until the store closes the sink.
    async fn subscribe(&self, filter: &ListingFilter, sink: EventSink) -> Result<Subscription>;

    /// Validate and store a seller's draft, returning the stored row
    async fn create_listing(&self, _draft: NewListing) -> Result<Listing> {
        Err(read_only(self.name()))
    }

    /// Rows owned by `user_id`
    async fn listings_by_owner(&self, _user_id: &str) -> Result<Vec<Listing>> {
        Err(read_only(self.name()))
    }

    /// Remove row `id` if `user_id` owns it
    ///
    /// Returns whether a row was removed.
    async fn delete_listing(&self, _user_id: &str, _id: &str) -> Result<bool> {
        Err(read_only(self.name()))
    }
}

fn read_only(store: &str) -> Error {
    Error::Store(format!("The {} store does not accept writes", store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::tests::listing_at;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_dispose_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!subscription.is_disposed());
        subscription.dispose();
        subscription.dispose();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_disposes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_accessors() {
        let listing = listing_at("a", "u", None);
        let event = ChangeEvent::Delete(listing.clone());
        assert_eq!(event.kind(), ChangeKind::Delete);
        assert_eq!(event.listing(), &listing);
        assert_eq!(ChangeKind::Update.to_string(), "update");
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl ListingStore for ReadOnlyStore {
        fn name(&self) -> &'static str {
            "read-only"
        }

        async fn query_snapshot(&self, _filter: &ListingFilter) -> Result<Vec<Listing>> {
            Ok(Vec::new())
        }

        async fn subscribe(
            &self,
            _filter: &ListingFilter,
            _sink: EventSink,
        ) -> Result<Subscription> {
            Ok(Subscription::new(|| {}))
        }
    }

    #[tokio::test]
    async fn test_writes_default_to_read_only() {
        let store = ReadOnlyStore;
        let draft = NewListing::new("u", crate::listing::Category::Car, "Vitz");

        assert!(matches!(store.create_listing(draft).await, Err(Error::Store(_))));
        assert!(store.listings_by_owner("u").await.is_err());
        assert!(store.delete_listing("u", "a").await.is_err());
    }
}
