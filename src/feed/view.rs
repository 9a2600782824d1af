//! Ordered nearby listings for one viewer coordinate
//!
//! Pure merge logic: no I/O, no clocks. The controller feeds it a snapshot
//! and then change events; the view keeps entries unique by id, inside the
//! radius, matching the filter, and sorted by ascending distance with ties in
//! arrival order.

use crate::coord::{is_nearby, listing_distance_km, Coordinates};
use crate::feed::NearbyListing;
use crate::listing::{Listing, ListingFilter};
use crate::store::ChangeEvent;

/// What applying a change did to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// Entry inserted or replaced
    Upserted,
    /// Existing entry removed
    Evicted,
    /// Nothing changed
    Ignored,
}

#[derive(Debug, Clone)]
pub struct FeedView {
    origin: Coordinates,
    radius_km: f64,
    filter: ListingFilter,
    entries: Vec<NearbyListing>,
}

impl FeedView {
    pub fn new(origin: Coordinates, radius_km: f64, filter: ListingFilter) -> Self {
        Self {
            origin,
            radius_km,
            filter,
            entries: Vec::new(),
        }
    }

    /// Build a view from a snapshot, as if every row had been inserted in order
    pub fn from_snapshot(
        origin: Coordinates,
        radius_km: f64,
        filter: ListingFilter,
        rows: Vec<Listing>,
    ) -> Self {
        let mut view = Self::new(origin, radius_km, filter);
        for row in rows {
            view.upsert(row);
        }
        view
    }

    pub fn origin(&self) -> Coordinates {
        self.origin
    }

    pub fn entries(&self) -> &[NearbyListing] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.listing.id == id)
    }

    /// Apply one change event
    pub fn apply(&mut self, event: ChangeEvent) -> ViewChange {
        match event {
            ChangeEvent::Insert(listing) | ChangeEvent::Update(listing) => self.upsert(listing),
            ChangeEvent::Delete(listing) => self.remove(&listing.id),
        }
    }

    /// Insert or replace a row by id, evicting it if it no longer qualifies
    pub fn upsert(&mut self, listing: Listing) -> ViewChange {
        let evicted = self.take(&listing.id);

        if !self.filter.matches(&listing) {
            return Self::evicted_or_ignored(evicted);
        }
        let distance_km = match listing_distance_km(self.origin, &listing) {
            Some(d) if is_nearby(d, self.radius_km) => d,
            _ => return Self::evicted_or_ignored(evicted),
        };

        let idx = self
            .entries
            .partition_point(|e| e.distance_km <= distance_km);
        self.entries.insert(
            idx,
            NearbyListing {
                listing,
                distance_km,
            },
        );
        ViewChange::Upserted
    }

    /// Remove a row by id
    pub fn remove(&mut self, id: &str) -> ViewChange {
        Self::evicted_or_ignored(self.take(id))
    }

    pub fn into_entries(self) -> Vec<NearbyListing> {
        self.entries
    }

    fn take(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|e| e.listing.id == id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    fn evicted_or_ignored(evicted: bool) -> ViewChange {
        if evicted {
            ViewChange::Evicted
        } else {
            ViewChange::Ignored
        }
    }
}
