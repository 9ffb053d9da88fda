//! In-memory subscription registry.
//!
//! Maps each feed key to the set of subscriptions interested in it. The
//! registry is shared between the poller and foreground add/remove calls.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::types::{FeedKey, Subscription};

/// Registry of subscriptions grouped by feed key.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    feeds: RwLock<HashMap<FeedKey, HashSet<Subscription>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the given subscriptions.
    pub fn from_subscriptions(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        Self {
            feeds: RwLock::new(group_by_feed(subscriptions)),
        }
    }

    /// Add a subscription.
    ///
    /// Returns false if an identical subscription was already present.
    pub async fn add(&self, subscription: Subscription) -> bool {
        let mut feeds = self.feeds.write().await;
        feeds
            .entry(subscription.url.clone())
            .or_default()
            .insert(subscription)
    }

    /// Add several subscriptions under a single lock.
    pub async fn extend(&self, subscriptions: impl IntoIterator<Item = Subscription>) {
        let mut feeds = self.feeds.write().await;
        for sub in subscriptions {
            feeds.entry(sub.url.clone()).or_default().insert(sub);
        }
    }

    /// Replace every entry with the given subscriptions.
    ///
    /// Readers see either the old or the new contents, never a mix.
    pub async fn replace_all(&self, subscriptions: impl IntoIterator<Item = Subscription>) {
        let feeds = group_by_feed(subscriptions);
        *self.feeds.write().await = feeds;
    }

    /// Remove a subscription.
    ///
    /// Returns false if it was not present. A feed left without subscribers
    /// is dropped from the registry.
    pub async fn remove(&self, subscription: &Subscription) -> bool {
        let mut feeds = self.feeds.write().await;
        let Some(set) = feeds.get_mut(&subscription.url) else {
            return false;
        };
        let removed = set.remove(subscription);
        if set.is_empty() {
            feeds.remove(&subscription.url);
        }
        removed
    }

    /// Take a consistent copy of every feed and its subscribers.
    ///
    /// Feeds are returned in key order so passes are deterministic.
    pub async fn snapshot(&self) -> Vec<(FeedKey, Vec<Subscription>)> {
        let feeds = self.feeds.read().await;
        let mut result: Vec<(FeedKey, Vec<Subscription>)> = feeds
            .iter()
            .map(|(key, subs)| (key.clone(), subs.iter().cloned().collect()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Get the subscribers of one feed.
    pub async fn subscribers(&self, key: &FeedKey) -> Vec<Subscription> {
        self.feeds
            .read()
            .await
            .get(key)
            .map(|subs| subs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of feeds with at least one subscriber.
    pub async fn feed_count(&self) -> usize {
        self.feeds.read().await.len()
    }

    /// Total number of subscriptions across all feeds.
    pub async fn subscription_count(&self) -> usize {
        self.feeds.read().await.values().map(HashSet::len).sum()
    }
}

fn group_by_feed(
    subscriptions: impl IntoIterator<Item = Subscription>,
) -> HashMap<FeedKey, HashSet<Subscription>> {
    let mut feeds: HashMap<FeedKey, HashSet<Subscription>> = HashMap::new();
    for sub in subscriptions {
        feeds.entry(sub.url.clone()).or_default().insert(sub);
    }
    feeds
}
