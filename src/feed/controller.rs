//! Listing feed controller
//!
//! One tokio task per feed. The task owns the view and the viewer location;
//! the handle shares only the disposed flag, the live subscription slot and
//! the state sender, so `dispose()` takes effect without waiting on the task.
//!
//! Each round resolves the viewer location, subscribes to changes, loads a
//! snapshot and merges both into a `FeedView`. A refresh drops the running
//! round (and with it any in-flight snapshot) before the next one starts.

use crate::coord::Coordinates;
use crate::feed::{FeedError, FeedOptions, FeedPhase, FeedState, FeedView, ViewChange};
use crate::geo::{GeolocationResolver, Positioning};
use crate::listing::ListingFilter;
use crate::store::{ChangeEvent, ListingStore, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum Command {
    Refresh,
    Dispose,
}

struct Shared {
    disposed: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
    state: watch::Sender<FeedState>,
}

impl Shared {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Modify the published state unless the feed is disposed
    fn publish(&self, modify: impl FnOnce(&mut FeedState)) {
        self.state.send_if_modified(|state| {
            if self.is_disposed() {
                return false;
            }
            modify(state);
            true
        });
    }

    /// Swap the live subscription, disposing the previous one
    ///
    /// On a disposed feed the new subscription is disposed immediately.
    fn replace_subscription(&self, subscription: Option<Subscription>) {
        let previous = {
            let mut slot = self
                .subscription
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.is_disposed() {
                subscription
            } else {
                std::mem::replace(&mut *slot, subscription)
            }
        };
        drop(previous);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(subscription);

        self.state.send_modify(|state| {
            state.phase = FeedPhase::Disposed;
            state.listings.clear();
            state.error = None;
        });
    }
}

/// Handle to a running nearby feed
///
/// Dropping the handle disposes the feed.
pub struct NearbyFeed {
    viewer_user_id: String,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<FeedState>,
}

impl NearbyFeed {
    pub fn viewer_user_id(&self) -> &str {
        &self.viewer_user_id
    }

    /// Observe state changes
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    /// Latest published state
    pub fn current(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Start a new round: re-resolve the location and reload everything
    ///
    /// Also the retry action after an error. No-op once disposed.
    pub fn refresh(&self) {
        if !self.is_disposed() {
            let _ = self.commands.send(Command::Refresh);
        }
    }

    /// Stop the feed
    ///
    /// Takes effect before returning: the subscription is released and
    /// nothing is published after `Disposed`. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
        let _ = self.commands.send(Command::Dispose);
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}

impl Drop for NearbyFeed {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Start a live, proximity-ranked feed of other users' listings
///
/// # Arguments
/// * `viewer_user_id` - The signed-in viewer; their own listings are excluded
/// * `profile_location_hint` - The viewer's profile location text, used when no fix is available
/// * `options` - Radius, filters and timing
/// * `store` - Listing table with snapshot queries and a change feed
/// * `positioning` - Device positioning capability
///
/// Must be called from within a tokio runtime.
pub fn create_nearby_feed(
    viewer_user_id: impl Into<String>,
    profile_location_hint: Option<String>,
    options: FeedOptions,
    store: Arc<dyn ListingStore>,
    positioning: Arc<dyn Positioning>,
) -> NearbyFeed {
    let viewer_user_id = viewer_user_id.into();
    let (state_tx, state_rx) = watch::channel(FeedState::idle());
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let shared = Arc::new(Shared {
        disposed: AtomicBool::new(false),
        subscription: Mutex::new(None),
        state: state_tx,
    });

    let controller = FeedController {
        filter: options.filter_for(&viewer_user_id),
        resolver: GeolocationResolver::new(positioning, options.geolocation),
        viewer_user_id: viewer_user_id.clone(),
        profile_location: profile_location_hint,
        options,
        store,
        shared: shared.clone(),
    };
    tokio::spawn(controller.run(command_rx));

    NearbyFeed {
        viewer_user_id,
        shared,
        commands: command_tx,
        state: state_rx,
    }
}

struct FeedController {
    viewer_user_id: String,
    profile_location: Option<String>,
    options: FeedOptions,
    filter: ListingFilter,
    store: Arc<dyn ListingStore>,
    resolver: GeolocationResolver,
    shared: Arc<Shared>,
}

type Connection = (FeedView, mpsc::UnboundedReceiver<ChangeEvent>);

impl FeedController {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!(
            "Starting nearby feed for {} (store: {}, radius: {} km)",
            self.viewer_user_id,
            self.store.name(),
            self.options.radius_km
        );

        let mut round = 0;
        while !self.shared.is_disposed() {
            round += 1;

            // A round only returns after reaching Error; otherwise it runs
            // until the next command cancels it
            let interrupted = tokio::select! {
                () = self.run_round(round) => None,
                command = commands.recv() => Some(command),
            };
            let command = match interrupted {
                Some(command) => command,
                None => commands.recv().await,
            };

            match command {
                Some(Command::Refresh) => {
                    debug!("Refreshing nearby feed (round {})", round + 1)
                }
                Some(Command::Dispose) | None => break,
            }
        }

        self.shared.dispose();
        info!("Nearby feed for {} stopped", self.viewer_user_id);
    }

    async fn run_round(&self, round: u64) {
        // Nothing from the previous round survives: no subscription, no
        // listings, no location
        self.shared.replace_subscription(None);
        self.shared.publish(|state| {
            *state = FeedState {
                phase: FeedPhase::ResolvingLocation,
                round,
                ..FeedState::idle()
            };
        });

        let location = self
            .resolver
            .resolve(self.profile_location.as_deref())
            .await;
        self.shared.publish(|state| {
            state.phase = FeedPhase::LoadingSnapshot;
            state.location = Some(location);
        });

        let origin = location.coordinate;
        let (mut view, mut events) = match self.connect(origin).await {
            Ok(connection) => connection,
            Err(e) => return self.fail(e),
        };

        // Consecutive reconnect attempts; a connection only clears it once it
        // has delivered an event or stayed up past the backoff cap
        let mut attempts = 0;
        loop {
            let live_since = Instant::now();
            let mut delivered = self.go_live(&mut view, &mut events);

            while let Some(event) = events.recv().await {
                delivered += 1;
                if view.apply(event) != ViewChange::Ignored {
                    self.publish_listings(&view);
                }
            }

            if delivered > 0 || self.options.reconnect.is_stable(live_since.elapsed()) {
                attempts = 0;
            }

            warn!("Change feed for {} closed, reconnecting", self.viewer_user_id);
            self.shared.replace_subscription(None);
            self.shared.publish(|state| state.phase = FeedPhase::Stale);

            match self.reconnect(origin, &mut attempts).await {
                Ok((new_view, new_events)) => {
                    view = new_view;
                    events = new_events;
                }
                Err(e) => return self.fail(e),
            }
        }
    }

    /// Subscribe, then load the snapshot for `origin`
    ///
    /// The subscription opens first so no change between the two is lost;
    /// changes queue in the channel until the snapshot is merged.
    async fn connect(&self, origin: Coordinates) -> Result<Connection, FeedError> {
        let (sink, events) = mpsc::unbounded_channel();
        let subscription = self
            .store
            .subscribe(&self.filter, sink)
            .await
            .map_err(|e| FeedError::SubscriptionFailed(e.to_string()))?;
        self.shared.replace_subscription(Some(subscription));

        let rows = self
            .store
            .query_snapshot(&self.filter)
            .await
            .map_err(|e| FeedError::SnapshotQueryFailed(e.to_string()))?;
        debug!("Snapshot returned {} rows", rows.len());

        let view =
            FeedView::from_snapshot(origin, self.options.radius_km, self.filter.clone(), rows);
        Ok((view, events))
    }

    /// Apply changes queued during the snapshot and publish `Live`
    ///
    /// Returns the number of queued changes applied.
    fn go_live(
        &self,
        view: &mut FeedView,
        events: &mut mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> usize {
        let mut replayed = 0;
        while let Ok(event) = events.try_recv() {
            view.apply(event);
            replayed += 1;
        }

        info!(
            "Nearby feed live with {} listings ({} queued changes applied)",
            view.len(),
            replayed
        );
        self.shared.publish(|state| {
            state.phase = FeedPhase::Live;
            state.listings = view.entries().to_vec();
            state.error = None;
        });
        replayed
    }

    fn publish_listings(&self, view: &FeedView) {
        self.shared
            .publish(|state| state.listings = view.entries().to_vec());
    }

    /// Reconnect with backoff, continuing the count in `attempts`
    ///
    /// A successful connect still counts as an attempt; the caller resets
    /// `attempts` once that connection proves healthy.
    async fn reconnect(
        &self,
        origin: Coordinates,
        attempts: &mut u32,
    ) -> Result<Connection, FeedError> {
        let policy = self.options.reconnect;
        let mut last_error = String::from("change feed closed");

        while *attempts < policy.max_attempts {
            let attempt = *attempts;
            *attempts += 1;

            let delay = policy.delay(attempt);
            debug!("Reconnect attempt {} in {:?}", attempt + 1, delay);
            tokio::time::sleep(delay).await;

            match self.connect(origin).await {
                Ok(connection) => {
                    info!("Change feed reconnected on attempt {}", attempt + 1);
                    return Ok(connection);
                }
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", attempt + 1, e);
                    self.shared.replace_subscription(None);
                    last_error = e.to_string();
                }
            }
        }

        Err(FeedError::SubscriptionDropped(format!(
            "gave up after {} reconnect attempts: {}",
            policy.max_attempts, last_error
        )))
    }

    fn fail(&self, error: FeedError) {
        warn!("Nearby feed for {} failed: {}", self.viewer_user_id, error);
        self.shared.replace_subscription(None);
        self.shared.publish(|state| {
            state.phase = FeedPhase::Error;
            state.error = Some(error);
        });
    }
}
