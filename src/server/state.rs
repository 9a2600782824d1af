//! Server shared state
//!
//! Holds configuration, the viewer session, the listing store and the feed
//! that follows the session.

use crate::auth::{AuthSession, FeedSupervisor};
use crate::config::Config;
use crate::error::Result;
use crate::feed::FeedOptions;
use crate::geo::ip_location::IpPositioning;
use crate::geo::Positioning;
use crate::store::{ListingStore, RestListingStore};
use std::sync::Arc;
use std::time::Instant;

/// Shared state for the HTTP server
pub struct AppState {
    /// Configuration
    pub config: Config,

    /// Signed-in viewer, driven by `PUT`/`DELETE /api/session`
    pub session: AuthSession,

    /// Feed for the current viewer
    pub supervisor: FeedSupervisor,

    /// Listing table, also used for the viewer's own listings
    pub store: Arc<dyn ListingStore>,

    positioning_name: &'static str,
    started: Instant,
}

impl AppState {
    /// Create application state over explicit collaborators
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: Config,
        store: Arc<dyn ListingStore>,
        positioning: Arc<dyn Positioning>,
    ) -> Self {
        let session = AuthSession::new();
        let positioning_name = positioning.name();
        let supervisor = FeedSupervisor::new(
            &session,
            FeedOptions::from_config(&config),
            store.clone(),
            positioning,
        );

        Self {
            config,
            session,
            supervisor,
            store,
            positioning_name,
            started: Instant::now(),
        }
    }

    /// Create application state backed by the configured REST store and IP positioning
    pub fn from_config(config: Config) -> Result<Self> {
        let store = Arc::new(RestListingStore::from_config(&config.store)?);
        Ok(Self::new(config, store, Arc::new(IpPositioning::new())))
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn positioning_name(&self) -> &'static str {
        self.positioning_name
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
