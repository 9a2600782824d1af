//! Hosted table store over its REST interface
//!
//! Snapshot queries use PostgREST filters on `{url}/rest/v1/{table}`. The
//! change feed polls the same query and diffs consecutive results, so it
//! works without a realtime socket. After too many consecutive failed polls
//! the poller closes the sink, which subscribers observe as a disconnect.
//!
//! Writes are scoped to the owner: inserts return the stored row, deletes
//! match on both id and `user_id`.

use crate::config::StoreConfig;
use crate::constants::api::REST_PATH;
use crate::error::{Error, Result};
use crate::listing::{Listing, ListingFilter, NewListing};
use crate::store::{ChangeEvent, EventSink, ListingStore, Subscription};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// REST-backed listing store
#[derive(Debug, Clone)]
pub struct RestListingStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
    poll_interval: Duration,
    failure_threshold: u32,
}

impl RestListingStore {
    /// Create a store for a project URL and API key with default settings
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let defaults = StoreConfig::default();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: defaults.table,
            poll_interval: Duration::from_secs(defaults.poll_interval_secs),
            failure_threshold: defaults.failure_threshold,
        }
    }

    /// Create a store from the `[store]` config section
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::Config(
                "store.url is not set (mella-feed config store.url <url>)".to_string(),
            ));
        }

        Ok(Self::new(&config.url, &config.api_key)
            .with_table(&config.table)
            .with_poll_interval(Duration::from_secs(config.poll_interval_secs.max(1)))
            .with_failure_threshold(config.failure_threshold))
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    fn table_url(&self) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, self.table)
    }

    /// Attach the project key the way the REST gateway expects it
    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send a request and decode the returned rows
    async fn rows(&self, request: reqwest::RequestBuilder, action: &str) -> Result<Vec<Listing>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::Store(format!("Listing {} failed: {}", action, e)))?;

        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "Listing {} returned status: {}",
                action,
                response.status()
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("Failed to parse listing rows: {}", e)))?;

        Ok(decode_rows(rows))
    }

    /// Build the query URL for a filter
    ///
    /// Owner and category are filtered server-side; the text filter has no
    /// portable PostgREST form and is applied after decoding.
    fn query_url(&self, filter: &ListingFilter) -> String {
        let mut url = format!("{}?select=*", self.table_url());

        if let Some(user_id) = &filter.exclude_user_id {
            url.push_str(&format!("&user_id=neq.{}", urlencoding::encode(user_id)));
        }
        if let Some(category) = filter.category {
            url.push_str(&format!("&category=eq.{}", category.as_str()));
        }

        url
    }

    /// Run the filtered query once
    async fn fetch(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let request = self.client.get(self.query_url(filter));
        Ok(self
            .rows(request, "query")
            .await?
            .into_iter()
            .filter(|l| filter.matches(l))
            .collect())
    }

    fn owner_url(&self, user_id: &str) -> String {
        format!(
            "{}?select=*&user_id=eq.{}",
            self.table_url(),
            urlencoding::encode(user_id)
        )
    }

    fn delete_url(&self, user_id: &str, id: &str) -> String {
        format!(
            "{}?id=eq.{}&user_id=eq.{}",
            self.table_url(),
            urlencoding::encode(id),
            urlencoding::encode(user_id)
        )
    }
}

/// Decode rows one by one, skipping rows that do not fit the schema
fn decode_rows(rows: Vec<serde_json::Value>) -> Vec<Listing> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Listing>(row) {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!("Skipping undecodable listing row: {}", e);
                None
            }
        })
        .collect()
}

fn index_by_id(listings: Vec<Listing>) -> HashMap<String, Listing> {
    listings.into_iter().map(|l| (l.id.clone(), l)).collect()
}

/// Changes between two polls of the same query
///
/// Inserts and updates come in `current` order, deletes follow sorted by id.
fn diff(previous: &HashMap<String, Listing>, current: &[Listing]) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for listing in current {
        match previous.get(&listing.id) {
            None => events.push(ChangeEvent::Insert(listing.clone())),
            Some(old) if old != listing => events.push(ChangeEvent::Update(listing.clone())),
            Some(_) => {}
        }
    }

    let current_ids: HashSet<&str> = current.iter().map(|l| l.id.as_str()).collect();
    let mut removed: Vec<&Listing> = previous
        .values()
        .filter(|old| !current_ids.contains(old.id.as_str()))
        .collect();
    removed.sort_by(|a, b| a.id.cmp(&b.id));
    events.extend(removed.into_iter().cloned().map(ChangeEvent::Delete));

    events
}

#[async_trait]
impl ListingStore for RestListingStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn query_snapshot(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        self.fetch(filter).await
    }

    async fn subscribe(&self, filter: &ListingFilter, sink: EventSink) -> Result<Subscription> {
        // Baseline for the first diff; a failure here fails the subscription
        let mut known = index_by_id(self.fetch(filter).await?);

        let store = self.clone();
        let filter = filter.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut failures = 0;
            loop {
                ticker.tick().await;
                if sink.is_closed() {
                    return;
                }

                match store.fetch(&filter).await {
                    Ok(rows) => {
                        failures = 0;
                        let events = diff(&known, &rows);
                        if !events.is_empty() {
                            debug!("Change feed poll produced {} events", events.len());
                        }
                        for event in events {
                            if sink.send(event).is_err() {
                                return;
                            }
                        }
                        known = index_by_id(rows);
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(
                            "Change feed poll failed ({}/{}): {}",
                            failures, store.failure_threshold, e
                        );
                        if failures >= store.failure_threshold {
                            warn!("Closing change feed after {} failed polls", failures);
                            return;
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(move || handle.abort()))
    }

    async fn create_listing(&self, draft: NewListing) -> Result<Listing> {
        draft.validate()?;

        // Id and created_at are assigned by the table
        let request = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(&draft);

        let listing = self
            .rows(request, "insert")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store("Insert returned no row".to_string()))?;

        debug!("Inserted listing {}", listing.id);
        Ok(listing)
    }

    async fn listings_by_owner(&self, user_id: &str) -> Result<Vec<Listing>> {
        let request = self.client.get(self.owner_url(user_id));
        self.rows(request, "query").await
    }

    async fn delete_listing(&self, user_id: &str, id: &str) -> Result<bool> {
        let request = self
            .client
            .delete(self.delete_url(user_id, id))
            .header("Prefer", "return=representation");

        let removed = self.rows(request, "delete").await?;
        debug!("Deleted {} rows for listing {}", removed.len(), id);
        Ok(!removed.is_empty())
    }
}
