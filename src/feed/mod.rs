//! Proximity-ranked listing feed
//!
//! This module handles:
//! - The published `FeedState` and its phases
//! - `FeedView`, the ordered set of nearby listings for one viewer coordinate
//! - `NearbyFeed`, the controller task that keeps the view live

pub mod controller;
pub mod view;

pub use controller::{create_nearby_feed, NearbyFeed};
pub use view::{FeedView, ViewChange};

use crate::config::Config;
use crate::geo::{GeolocationSettings, ResolvedLocation};
use crate::listing::{Category, Listing, ListingFilter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A listing with its distance from the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyListing {
    pub listing: Listing,
    pub distance_km: f64,
}

/// Lifecycle phase of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPhase {
    /// Not started, or no viewer is signed in
    Idle,
    ResolvingLocation,
    LoadingSnapshot,
    /// Snapshot merged, applying live changes
    Live,
    /// Change feed lost; listings are kept while reconnecting
    Stale,
    Error,
    Disposed,
}

impl fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ResolvingLocation => write!(f, "resolving_location"),
            Self::LoadingSnapshot => write!(f, "loading_snapshot"),
            Self::Live => write!(f, "live"),
            Self::Stale => write!(f, "stale"),
            Self::Error => write!(f, "error"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Failures surfaced to feed observers
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FeedError {
    #[error("Snapshot query failed: {0}")]
    SnapshotQueryFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Subscription dropped: {0}")]
    SubscriptionDropped(String),
}

/// Everything an observer of the feed sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedState {
    pub phase: FeedPhase,

    /// Load round, starting at 1; bumped by every refresh or retry
    pub round: u64,

    /// Viewer coordinate the listings were measured from
    pub location: Option<ResolvedLocation>,

    /// Ascending by distance
    pub listings: Vec<NearbyListing>,

    pub error: Option<FeedError>,
}

impl FeedState {
    pub fn idle() -> Self {
        Self {
            phase: FeedPhase::Idle,
            round: 0,
            location: None,
            listings: Vec::new(),
            error: None,
        }
    }

    /// Whether listings are being loaded for the first time in a round
    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            FeedPhase::ResolvingLocation | FeedPhase::LoadingSnapshot
        )
    }

    /// A second or later round in progress
    pub fn is_refreshing(&self) -> bool {
        self.is_loading() && self.round > 1
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Reconnect schedule for a dropped change feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.reconnect.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.reconnect.max_backoff_ms),
            max_attempts: config.reconnect.max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based)
    ///
    /// Doubles from `initial_backoff` up to `max_backoff`, then shaves off up
    /// to 10% at random so feeds that dropped together do not retry together.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
            .min(self.max_backoff);

        let jitter = rand::thread_rng().gen_range(0.0..=0.1);
        base.mul_f64(1.0 - jitter)
    }

    /// Whether a connection that delivered nothing stayed up long enough
    /// to reset the attempt count
    pub fn is_stable(&self, uptime: Duration) -> bool {
        uptime >= self.max_backoff
    }
}

/// Settings for one feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedOptions {
    /// Only listings strictly closer than this are shown
    pub radius_km: f64,
    pub category: Option<Category>,
    /// Case-insensitive text filter
    pub text: Option<String>,
    pub geolocation: GeolocationSettings,
    pub reconnect: ReconnectPolicy,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FeedOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            radius_km: config.feed.radius_km,
            category: None,
            text: None,
            geolocation: GeolocationSettings::from_config(config),
            reconnect: ReconnectPolicy::from_config(config),
        }
    }

    pub fn with_radius(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    pub fn with_geolocation(mut self, geolocation: GeolocationSettings) -> Self {
        self.geolocation = geolocation;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Store filter for a viewer: everything not theirs, narrowed by the options
    pub fn filter_for(&self, viewer_user_id: &str) -> ListingFilter {
        ListingFilter::excluding_user(viewer_user_id)
            .with_category(self.category)
            .with_text(self.text.clone())
    }
}
