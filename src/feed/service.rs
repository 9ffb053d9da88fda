//! Feed subscription service for feedrelay.
//!
//! Keeps the persisted subscriptions and the in-memory registry in step,
//! and owns the state the poller shares with foreground operations.

use std::sync::Arc;

use tokio::time::Duration;
use tracing::info;

use super::cursor::CursorStore;
use super::dispatch::Dispatcher;
use super::fetcher::FeedFetcher;
use super::poller::{FeedPoller, PollerHandle};
use super::registry::SubscriptionRegistry;
use super::repository::SubscriptionRepository;
use super::types::{FeedKey, FeedSubscription, DEFAULT_MAX_SUBSCRIPTIONS_PER_GROUP};
use crate::db::Database;
use crate::{RelayError, Result};

/// Outcome of adding a feed.
#[derive(Debug, Clone)]
pub enum AddFeedResult {
    /// The subscription was created.
    Added(FeedSubscription),
    /// The group already subscribes to this URL.
    Duplicate,
    /// The group is at its subscription limit.
    LimitReached,
    /// The URL is not a well-formed absolute http(s) URL.
    InvalidUrl,
}

impl AddFeedResult {
    /// Check whether the subscription was created.
    pub fn is_added(&self) -> bool {
        matches!(self, AddFeedResult::Added(_))
    }
}

/// Service for feed subscriptions.
pub struct FeedService {
    db: Arc<Database>,
    registry: Arc<SubscriptionRegistry>,
    cursors: Arc<CursorStore>,
    max_subscriptions_per_group: usize,
}

impl FeedService {
    /// Create a service with an empty registry.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            registry: Arc::new(SubscriptionRegistry::new()),
            cursors: Arc::new(CursorStore::new()),
            max_subscriptions_per_group: DEFAULT_MAX_SUBSCRIPTIONS_PER_GROUP,
        }
    }

    /// Create a service whose registry is seeded from the database.
    pub async fn load(db: Arc<Database>) -> Result<Self> {
        let service = Self::new(db);
        let subscriptions = SubscriptionRepository::new(service.db.pool())
            .list_all()
            .await?;
        let count = subscriptions.len();
        service
            .registry
            .extend(subscriptions.iter().map(FeedSubscription::subscription))
            .await;
        info!(
            "Loaded {} subscription(s) across {} feed(s)",
            count,
            service.registry.feed_count().await
        );
        Ok(service)
    }

    /// Set the per-group subscription limit.
    pub fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions_per_group = max;
        self
    }

    /// The shared subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// The shared cursor store.
    pub fn cursors(&self) -> &Arc<CursorStore> {
        &self.cursors
    }

    /// Build a poller over this service's registry and cursors.
    ///
    /// The poller reloads the registry from the database before each pass.
    pub fn poller(&self, fetcher: Arc<dyn FeedFetcher>, dispatcher: Dispatcher) -> FeedPoller {
        FeedPoller::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.cursors),
            fetcher,
            dispatcher,
        )
        .with_store(Arc::clone(&self.db))
    }

    /// Start polling in the background.
    pub fn start(
        &self,
        fetcher: Arc<dyn FeedFetcher>,
        dispatcher: Dispatcher,
        interval: Duration,
    ) -> PollerHandle {
        self.poller(fetcher, dispatcher)
            .with_interval(interval)
            .start()
    }

    /// Subscribe a group's channel to a feed.
    ///
    /// On success every subscription the group holds is (re)added to the
    /// registry, so entries missing since startup are restored.
    pub async fn add_feed(
        &self,
        group_id: i64,
        channel_id: i64,
        url: &str,
    ) -> Result<AddFeedResult> {
        let key = FeedKey::normalize(url);
        if !is_feed_url(key.as_str()) {
            return Ok(AddFeedResult::InvalidUrl);
        }

        let repo = SubscriptionRepository::new(self.db.pool());
        let existing = repo.list_by_group(group_id).await?;

        if existing.iter().any(|s| s.url == key.as_str()) {
            return Ok(AddFeedResult::Duplicate);
        }

        // The store enforces the limit atomically; `existing` may be stale.
        let created = match repo
            .create_within_limit(
                group_id,
                channel_id,
                key.as_str(),
                self.max_subscriptions_per_group,
            )
            .await
        {
            Ok(Some(created)) => created,
            Ok(None) => return Ok(AddFeedResult::LimitReached),
            // Lost a race with a concurrent add of the same URL
            Err(RelayError::Validation(_)) => return Ok(AddFeedResult::Duplicate),
            Err(e) => return Err(e),
        };

        self.registry
            .extend(
                existing
                    .iter()
                    .chain(std::iter::once(&created))
                    .map(FeedSubscription::subscription),
            )
            .await;

        info!(
            "Group {} subscribed channel {} to {}",
            group_id, channel_id, key
        );
        Ok(AddFeedResult::Added(created))
    }

    /// Remove the group's subscription at `index` (0-based, creation order).
    ///
    /// Returns false for a negative or out-of-range index.
    pub async fn remove_feed(&self, group_id: i64, index: i64) -> Result<bool> {
        let Ok(index) = usize::try_from(index) else {
            return Ok(false);
        };

        let repo = SubscriptionRepository::new(self.db.pool());
        let subscriptions = repo.list_by_group(group_id).await?;
        let Some(target) = subscriptions.get(index) else {
            return Ok(false);
        };

        repo.delete(target.id).await?;
        self.registry.remove(&target.subscription()).await;

        info!(
            "Group {} unsubscribed channel {} from {}",
            group_id, target.channel_id, target.url
        );
        Ok(true)
    }

    /// List a group's subscriptions in creation order.
    pub async fn list_feeds(&self, group_id: i64) -> Result<Vec<FeedSubscription>> {
        SubscriptionRepository::new(self.db.pool())
            .list_by_group(group_id)
            .await
    }
}

/// Check that a normalized URL is a well-formed absolute http(s) URL.
fn is_feed_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}
