//! In-process listing store
//!
//! Keeps listings in memory and pushes every write to matching subscribers.
//! Backs tests and embedded hosts that own their data.

use crate::error::{Error, Result};
use crate::listing::{Listing, ListingFilter, NewListing};
use crate::store::{ChangeEvent, EventSink, ListingStore, Subscription};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// In-memory listing table
#[derive(Clone, Default)]
pub struct MemoryListingStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    listings: Vec<Listing>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
}

struct Subscriber {
    filter: ListingFilter,
    sink: EventSink,
}

impl Inner {
    /// Send an event to every interested subscriber, dropping closed ones
    ///
    /// An update reaches subscribers that matched the old row too, so they
    /// learn the row left their filter.
    fn publish(&mut self, event: ChangeEvent, previous: Option<&Listing>) {
        self.subscribers.retain(|_, subscriber| {
            let interested = subscriber.filter.matches(event.listing())
                || previous.is_some_and(|old| subscriber.filter.matches(old));
            !interested || subscriber.sink.send(event.clone()).is_ok()
        });
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.listings.iter().position(|l| l.id == id)
    }
}

impl MemoryListingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with listings (no events are sent)
    pub fn with_listings(listings: Vec<Listing>) -> Self {
        let store = Self::new();
        store.lock().listings = listings;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a listing from a draft, assigning its id and creation time
    pub fn insert(&self, draft: NewListing) -> Result<Listing> {
        draft.validate()?;
        let listing = draft.into_listing(uuid::Uuid::new_v4().to_string(), Utc::now());

        let mut inner = self.lock();
        inner.listings.push(listing.clone());
        inner.publish(ChangeEvent::Insert(listing.clone()), None);

        debug!("Inserted listing {}", listing.id);
        Ok(listing)
    }

    /// Write a complete row, inserting or replacing by id
    pub fn upsert(&self, listing: Listing) -> Result<()> {
        listing.validate()?;

        let mut inner = self.lock();
        match inner.position(&listing.id) {
            Some(idx) => {
                let previous = std::mem::replace(&mut inner.listings[idx], listing.clone());
                inner.publish(ChangeEvent::Update(listing), Some(&previous));
            }
            None => {
                inner.listings.push(listing.clone());
                inner.publish(ChangeEvent::Insert(listing), None);
            }
        }
        Ok(())
    }

    /// Replace an existing row, stamping `updated_at`
    pub fn update(&self, mut listing: Listing) -> Result<Listing> {
        listing.validate()?;
        listing.updated_at = Some(Utc::now());

        let mut inner = self.lock();
        let idx = inner
            .position(&listing.id)
            .ok_or_else(|| Error::Store(format!("Listing not found: {}", listing.id)))?;

        let previous = std::mem::replace(&mut inner.listings[idx], listing.clone());
        inner.publish(ChangeEvent::Update(listing.clone()), Some(&previous));
        Ok(listing)
    }

    /// Remove a row by id
    pub fn delete(&self, id: &str) -> Option<Listing> {
        let mut inner = self.lock();
        let idx = inner.position(id)?;
        let removed = inner.listings.remove(idx);
        inner.publish(ChangeEvent::Delete(removed.clone()), None);
        Some(removed)
    }

    /// Get a row by id
    pub fn get(&self, id: &str) -> Option<Listing> {
        let inner = self.lock();
        inner.position(id).map(|idx| inner.listings[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().listings.is_empty()
    }

    /// Number of open subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Drop every subscription's sink, as a lost connection would
    pub fn disconnect_subscribers(&self) {
        self.lock().subscribers.clear();
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query_snapshot(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        Ok(self
            .lock()
            .listings
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect())
    }

    async fn subscribe(&self, filter: &ListingFilter, sink: EventSink) -> Result<Subscription> {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(
                id,
                Subscriber {
                    filter: filter.clone(),
                    sink,
                },
            );
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .remove(&id);
            }
        }))
    }

    async fn create_listing(&self, draft: NewListing) -> Result<Listing> {
        self.insert(draft)
    }

    async fn listings_by_owner(&self, user_id: &str) -> Result<Vec<Listing>> {
        Ok(self
            .lock()
            .listings
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_listing(&self, user_id: &str, id: &str) -> Result<bool> {
        match self.get(id) {
            Some(listing) if listing.user_id == user_id => Ok(self.delete(id).is_some()),
            _ => Ok(false),
        }
    }
}
