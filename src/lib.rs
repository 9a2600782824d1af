//! mella-feed: Proximity-Ranked Listing Feed
//!
//! A library and CLI tool that keeps a live, distance-ordered feed of other
//! users' marketplace listings around a viewer.
//!
//! ## Features
//!
//! - Viewer location with a fallback chain (precise fix, profile location, home city)
//! - Haversine distance and a strict nearby radius
//! - Snapshot plus change-feed merging with dedup, ordering and eviction
//! - Refresh, dispose and reconnect with backoff
//! - HTTP API + CLI interface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mella_feed::feed::{create_nearby_feed, FeedOptions, FeedPhase};
//! use mella_feed::geo::DisabledPositioning;
//! use mella_feed::store::MemoryListingStore;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryListingStore::new());
//! let feed = create_nearby_feed(
//!     "viewer-id",
//!     Some("9.0105, 38.7645".to_string()),
//!     FeedOptions::default(),
//!     store,
//!     Arc::new(DisabledPositioning),
//! );
//!
//! let mut state = feed.state();
//! let live = state.wait_for(|s| s.phase == FeedPhase::Live).await.unwrap();
//! for entry in &live.listings {
//!     println!("{:.1} km  {}", entry.distance_km, entry.listing.title);
//! }
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod coord;
pub mod error;
pub mod feed;
pub mod format;
pub mod geo;
pub mod listing;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use coord::{distance_km, is_nearby, parse_location_string, Coordinates};
pub use error::{Error, Result};
pub use feed::{create_nearby_feed, FeedPhase, FeedState, NearbyFeed, NearbyListing};
pub use geo::{LocationSource, ResolvedLocation};
pub use listing::{Category, Listing};
