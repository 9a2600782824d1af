//! Viewer identity
//!
//! The feed needs to know who is looking: their listings are excluded and
//! their profile location is a positioning fallback. `IdentityProvider`
//! exposes the signed-in viewer as a watch stream; `FeedSupervisor` follows
//! it and keeps exactly one feed alive per signed-in viewer.

use crate::feed::{create_nearby_feed, FeedOptions, FeedPhase, FeedState, NearbyFeed};
use crate::geo::Positioning;
use crate::store::ListingStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// The signed-in user as far as the feed is concerned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: String,

    /// Free-text location from the user's profile
    #[serde(default)]
    pub profile_location: Option<String>,
}

impl Viewer {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            profile_location: None,
        }
    }

    pub fn with_profile_location(mut self, location: impl Into<String>) -> Self {
        self.profile_location = Some(location.into());
        self
    }
}

/// Source of the current viewer
pub trait IdentityProvider: Send + Sync {
    /// The signed-in viewer, or `None` when anonymous
    fn viewer(&self) -> Option<Viewer>;

    fn current_user_id(&self) -> Option<String> {
        self.viewer().map(|v| v.user_id)
    }

    /// Observe sign-in and sign-out transitions
    fn subscribe(&self) -> watch::Receiver<Option<Viewer>>;
}

/// In-process session backed by a watch channel
#[derive(Debug, Clone)]
pub struct AuthSession {
    viewer: Arc<watch::Sender<Option<Viewer>>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    /// Create an anonymous session
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            viewer: Arc::new(tx),
        }
    }

    /// Sign a viewer in, replacing any previous one
    ///
    /// Signing in the same viewer again is not a transition.
    pub fn sign_in(&self, viewer: Viewer) {
        self.viewer.send_if_modified(|current| {
            if current.as_ref() == Some(&viewer) {
                return false;
            }
            info!("Viewer {} signed in", viewer.user_id);
            *current = Some(viewer);
            true
        });
    }

    pub fn sign_out(&self) {
        self.viewer.send_if_modified(|current| match current.take() {
            Some(viewer) => {
                info!("Viewer {} signed out", viewer.user_id);
                true
            }
            None => false,
        });
    }
}

impl IdentityProvider for AuthSession {
    fn viewer(&self) -> Option<Viewer> {
        self.viewer.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Viewer>> {
        self.viewer.subscribe()
    }
}

enum Command {
    Refresh,
    Dispose,
}

/// Everything needed to start a feed for a viewer
#[derive(Clone)]
struct FeedFactory {
    options: FeedOptions,
    store: Arc<dyn ListingStore>,
    positioning: Arc<dyn Positioning>,
}

impl FeedFactory {
    fn create(&self, viewer: &Viewer) -> NearbyFeed {
        create_nearby_feed(
            viewer.user_id.clone(),
            viewer.profile_location.clone(),
            self.options.clone(),
            self.store.clone(),
            self.positioning.clone(),
        )
    }
}

/// Keeps the nearby feed in step with the signed-in viewer
///
/// Every identity transition disposes the current feed; a signed-in viewer
/// then gets a fresh one. While anonymous the published state is `Idle`.
pub struct FeedSupervisor {
    state: watch::Receiver<FeedState>,
    commands: mpsc::UnboundedSender<Command>,
}

impl FeedSupervisor {
    /// Start following `identity`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        identity: &dyn IdentityProvider,
        options: FeedOptions,
        store: Arc<dyn ListingStore>,
        positioning: Arc<dyn Positioning>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(FeedState::idle());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let factory = FeedFactory {
            options,
            store,
            positioning,
        };

        tokio::spawn(supervise(identity.subscribe(), factory, state_tx, command_rx));

        Self {
            state: state_rx,
            commands: command_tx,
        }
    }

    /// Observe the active feed's state
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    pub fn current(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Current phase, without copying the listings
    pub fn phase(&self) -> FeedPhase {
        self.state.borrow().phase
    }

    /// Refresh the active feed, if any
    pub fn refresh(&self) {
        let _ = self.commands.send(Command::Refresh);
    }

    /// Stop following identity changes and dispose the active feed
    pub fn dispose(&self) {
        let _ = self.commands.send(Command::Dispose);
    }
}

impl Drop for FeedSupervisor {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn supervise(
    mut identity: watch::Receiver<Option<Viewer>>,
    factory: FeedFactory,
    state: watch::Sender<FeedState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut feed: Option<NearbyFeed> = None;

    'identity: loop {
        let viewer = identity.borrow_and_update().clone();

        // The old feed goes before the new one starts
        drop(feed.take());
        feed = viewer.as_ref().map(|v| factory.create(v));

        let mut feed_state = match &feed {
            Some(active) => {
                let mut rx = active.state();
                state.send_replace(rx.borrow_and_update().clone());
                Some(rx)
            }
            None => {
                state.send_replace(FeedState::idle());
                None
            }
        };

        loop {
            tokio::select! {
                changed = identity.changed() => {
                    if changed.is_err() {
                        break 'identity;
                    }
                    continue 'identity;
                }
                Some(next) = next_state(&mut feed_state) => {
                    state.send_replace(next);
                }
                command = commands.recv() => match command {
                    Some(Command::Refresh) => {
                        if let Some(active) = &feed {
                            active.refresh();
                        }
                    }
                    Some(Command::Dispose) | None => break 'identity,
                },
            }
        }
    }

    drop(feed);
    state.send_modify(|s| {
        s.phase = FeedPhase::Disposed;
        s.listings.clear();
    });
}

/// Next state of the active feed; pending forever when there is none
async fn next_state(rx: &mut Option<watch::Receiver<FeedState>>) -> Option<FeedState> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
