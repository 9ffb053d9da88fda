//! Background feed poller for feedrelay.
//!
//! The poller repeatedly walks every subscribed feed, delivers items newer
//! than the feed's cursor and then sleeps for a fixed interval.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use super::cursor::CursorStore;
use super::dispatch::{DispatchReport, Dispatcher};
use super::fetcher::FeedFetcher;
use super::filter::select_new_items;
use super::registry::SubscriptionRegistry;
use super::render::render;
use super::repository::SubscriptionRepository;
use super::types::{
    FeedItem, FeedKey, FeedSubscription, Subscription, DEFAULT_POLL_INTERVAL_SECS,
};
use crate::db::Database;

/// Counts for one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Feeds fetched (successfully or not).
    pub feeds_polled: usize,
    /// Feeds whose fetch failed.
    pub feeds_failed: usize,
    /// Feeds polled for the first time (cursor initialized, nothing sent).
    pub feeds_initialized: usize,
    /// New items dispatched.
    pub new_items: usize,
    /// Per-channel send counts.
    pub delivery: DispatchReport,
}

/// Feed poller.
pub struct FeedPoller {
    registry: Arc<SubscriptionRegistry>,
    cursors: Arc<CursorStore>,
    fetcher: Arc<dyn FeedFetcher>,
    dispatcher: Dispatcher,
    store: Option<Arc<Database>>,
    interval: Duration,
}

impl FeedPoller {
    /// Create a poller with the default interval.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        cursors: Arc<CursorStore>,
        fetcher: Arc<dyn FeedFetcher>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            registry,
            cursors,
            fetcher,
            dispatcher,
            store: None,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Reload the registry from `db` at the start of every pass.
    ///
    /// Subscriptions added or removed by other processes sharing the
    /// database then take effect on the next pass.
    pub fn with_store(mut self, db: Arc<Database>) -> Self {
        self.store = Some(db);
        self
    }

    /// Set the delay between passes.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Delay between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the polling loop on the tokio runtime.
    pub fn start(self) -> PollerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            self.run(cancel_rx).await;
        });
        PollerHandle {
            cancel: cancel_tx,
            task,
        }
    }

    /// Run the polling loop until `cancel` becomes true or its sender is
    /// dropped.
    ///
    /// A pass in flight when cancellation arrives is abandoned; cursors are
    /// advanced per item, so nothing is left half-updated.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            "Feed poller started (interval: {} seconds)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                report = self.run_pass() => log_pass(&report),
                _ = cancel.wait_for(|stop| *stop) => break,
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = cancel.wait_for(|stop| *stop) => break,
            }
        }

        info!("Feed poller stopped");
    }

    /// Run one pass over every subscribed feed.
    ///
    /// Feeds are fetched one after another. Delivery for a feed runs in its
    /// own task so it overlaps later fetches; the pass returns once every
    /// delivery has finished.
    pub async fn run_pass(&self) -> PassReport {
        self.sync_registry().await;
        let snapshot = self.registry.snapshot().await;
        let mut report = PassReport::default();
        let mut deliveries: JoinSet<DispatchReport> = JoinSet::new();

        for (key, subscribers) in snapshot {
            if subscribers.is_empty() {
                continue;
            }
            report.feeds_polled += 1;

            let items = match self.fetcher.fetch(key.as_str()).await {
                Ok(items) => items,
                Err(e) => {
                    report.feeds_failed += 1;
                    warn!(feed = %key, "Failed to fetch feed: {}", e);
                    continue;
                }
            };

            let cursor = self.cursors.get(&key).await;
            let outcome = select_new_items(items, cursor, Utc::now());

            if outcome.first_poll {
                report.feeds_initialized += 1;
                let cursor = self.cursors.initialize(&key, outcome.cursor).await;
                debug!("First poll of {}: cursor set to {}", key, cursor);
                continue;
            }

            if outcome.new_items.is_empty() {
                debug!("No new items in {}", key);
                continue;
            }

            report.new_items += outcome.new_items.len();
            debug!("{} new item(s) in {}", outcome.new_items.len(), key);
            deliveries.spawn(deliver_items(
                Arc::clone(&self.cursors),
                self.dispatcher.clone(),
                key,
                subscribers,
                outcome.new_items,
            ));
        }

        while let Some(result) = deliveries.join_next().await {
            match result {
                Ok(delivery) => report.delivery.merge(delivery),
                Err(e) => error!("Delivery task failed: {}", e),
            }
        }

        report
    }

    async fn sync_registry(&self) {
        let Some(db) = &self.store else {
            return;
        };
        match SubscriptionRepository::new(db.pool()).list_all().await {
            Ok(subscriptions) => {
                self.registry
                    .replace_all(subscriptions.iter().map(FeedSubscription::subscription))
                    .await
            }
            // Keep polling with what we have
            Err(e) => warn!("Failed to reload subscriptions: {}", e),
        }
    }
}

/// Deliver one feed's new items, oldest first.
///
/// The cursor is moved past each item before it is sent.
async fn deliver_items(
    cursors: Arc<CursorStore>,
    dispatcher: Dispatcher,
    key: FeedKey,
    subscribers: Vec<Subscription>,
    items: Vec<(DateTime<Utc>, FeedItem)>,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for (timestamp, item) in items {
        // Equal timestamps within a batch leave the cursor where it is.
        cursors.advance(&key, timestamp).await;
        let notification = render(&item, &key);
        report.merge(dispatcher.dispatch(&subscribers, &notification).await);
    }
    report
}

fn log_pass(report: &PassReport) {
    if report.new_items > 0 || report.feeds_failed > 0 {
        info!(
            "Pass complete: {} feed(s), {} failed, {} new item(s), {} sent, {} skipped, {} failed send(s)",
            report.feeds_polled,
            report.feeds_failed,
            report.new_items,
            report.delivery.delivered,
            report.delivery.skipped,
            report.delivery.failed
        );
    } else {
        debug!(
            "Pass complete: {} feed(s), no new items",
            report.feeds_polled
        );
    }
}

/// Handle to a running poller task.
pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            error!("Feed poller task ended abnormally: {}", e);
        }
    }

    /// Check whether the poller task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::dispatch::{ChannelResolver, MessageSender};
    use crate::feed::types::{Channel, Notification};
    use crate::{RelayError, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const FEED: &str = "https://example.com/feed";

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, min, 0).unwrap()
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        feeds: Mutex<HashMap<String, Result<Vec<FeedItem>>>>,
    }

    impl ScriptedFetcher {
        fn set(&self, url: &str, items: Vec<FeedItem>) {
            self.feeds.lock().unwrap().insert(url.to_string(), Ok(items));
        }
    }

    #[async_trait]
    impl FeedFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
            match self.feeds.lock().unwrap().get(url) {
                Some(Ok(items)) => Ok(items.clone()),
                _ => Err(RelayError::Feed("unreachable".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelResolver for RecordingSender {
        async fn resolve(&self, group_id: i64, channel_id: i64) -> Option<Channel> {
            Some(Channel {
                group_id,
                channel_id,
                name: String::new(),
                endpoint: String::new(),
            })
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, _channel: &Channel, notification: &Notification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.title.clone());
            Ok(())
        }
    }

    fn poller() -> (FeedPoller, Arc<ScriptedFetcher>, Arc<RecordingSender>, Arc<CursorStore>) {
        let registry = Arc::new(SubscriptionRegistry::from_subscriptions(vec![
            Subscription::new(1, 10, FEED),
        ]));
        let cursors = Arc::new(CursorStore::new());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(sender.clone(), sender.clone());
        let poller = FeedPoller::new(registry, cursors.clone(), fetcher.clone(), dispatcher);
        (poller, fetcher, sender, cursors)
    }

    #[test]
    fn test_default_interval() {
        let (poller, _, _, _) = poller();
        assert_eq!(
            poller.interval(),
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );
        let poller = poller.with_interval(Duration::from_secs(60));
        assert_eq!(poller.interval(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_pass_delivers_in_ascending_order() {
        let (poller, fetcher, sender, cursors) = poller();
        let key = FeedKey::normalize(FEED);

        fetcher.set(FEED, vec![FeedItem::new("seed").with_published_at(at(10, 0))]);
        let report = poller.run_pass().await;
        assert_eq!(report.feeds_initialized, 1);
        assert!(sender.sent.lock().unwrap().is_empty());

        fetcher.set(
            FEED,
            vec![
                FeedItem::new("later").with_published_at(at(10, 20)),
                FeedItem::new("earlier").with_published_at(at(10, 10)),
                FeedItem::new("seed").with_published_at(at(10, 0)),
            ],
        );
        let report = poller.run_pass().await;
        assert_eq!(report.new_items, 2);
        assert_eq!(report.delivery.delivered, 2);
        assert_eq!(*sender.sent.lock().unwrap(), vec!["earlier", "later"]);
        assert_eq!(cursors.get(&key).await, Some(at(10, 20)));

        // Nothing new on the next pass
        let report = poller.run_pass().await;
        assert_eq!(report.new_items, 0);
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_counts_and_keeps_cursor() {
        let (poller, _fetcher, _sender, cursors) = poller();
        let report = poller.run_pass().await;
        assert_eq!(report.feeds_polled, 1);
        assert_eq!(report.feeds_failed, 1);
        assert!(cursors.get(&FeedKey::normalize(FEED)).await.is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (poller, fetcher, _sender, cursors) = poller();
        fetcher.set(FEED, vec![FeedItem::new("seed").with_published_at(at(10, 0))]);

        let handle = poller.with_interval(Duration::from_millis(10)).start();
        let key = FeedKey::normalize(FEED);
        for _ in 0..100 {
            if cursors.get(&key).await.is_some() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cursors.get(&key).await, Some(at(10, 0)));

        handle.stop().await;
    }

    /// Signals when a send starts, then never finishes it.
    #[derive(Default)]
    struct StalledSender {
        started: tokio::sync::Notify,
    }

    #[async_trait]
    impl ChannelResolver for StalledSender {
        async fn resolve(&self, group_id: i64, channel_id: i64) -> Option<Channel> {
            Some(Channel {
                group_id,
                channel_id,
                name: String::new(),
                endpoint: String::new(),
            })
        }
    }

    #[async_trait]
    impl MessageSender for StalledSender {
        async fn send(&self, _channel: &Channel, _notification: &Notification) -> Result<()> {
            self.started.notify_one();
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_during_send_keeps_cursor_consistent() {
        let registry = Arc::new(SubscriptionRegistry::from_subscriptions(vec![
            Subscription::new(1, 10, FEED),
        ]));
        let cursors = Arc::new(CursorStore::new());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let key = FeedKey::normalize(FEED);

        let stalled = Arc::new(StalledSender::default());
        let poller = FeedPoller::new(
            registry.clone(),
            cursors.clone(),
            fetcher.clone(),
            Dispatcher::new(stalled.clone(), stalled.clone()),
        )
        .with_interval(Duration::from_millis(10));

        fetcher.set(FEED, vec![FeedItem::new("seed").with_published_at(at(10, 0))]);
        poller.run_pass().await;
        fetcher.set(
            FEED,
            vec![
                FeedItem::new("seed").with_published_at(at(10, 0)),
                FeedItem::new("stuck").with_published_at(at(10, 10)),
            ],
        );

        let handle = poller.start();
        tokio::time::timeout(Duration::from_secs(5), stalled.started.notified())
            .await
            .expect("send should start");
        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("poller should stop while a send is pending");

        // The interrupted item counts as delivered
        assert_eq!(cursors.get(&key).await, Some(at(10, 10)));
        assert_eq!(registry.subscription_count().await, 1);

        let sender = Arc::new(RecordingSender::default());
        let poller = FeedPoller::new(
            registry,
            cursors.clone(),
            fetcher,
            Dispatcher::new(sender.clone(), sender.clone()),
        );
        let report = poller.run_pass().await;
        assert_eq!(report.new_items, 0);
        assert!(sender.sent.lock().unwrap().is_empty());
        assert_eq!(cursors.get(&key).await, Some(at(10, 10)));
    }

    #[tokio::test]
    async fn test_run_exits_when_sender_dropped() {
        let (poller, _, _, _) = poller();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        drop(cancel_tx);
        tokio::time::timeout(Duration::from_secs(5), poller.run(cancel_rx))
            .await
            .expect("poller should exit once its cancel sender is gone");
    }
}
