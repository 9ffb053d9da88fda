//! Test helpers for feed relay integration tests.
//!
//! Provides a scripted fetcher, a recording messenger and a service backed
//! by an in-memory database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use feedrelay::feed::{
    Channel, ChannelResolver, Dispatcher, FeedFetcher, FeedItem, FeedPoller, MessageSender,
    Notification,
};
use feedrelay::{Database, FeedService, RelayError, Result};

/// A timestamp on the fixed test day.
pub fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, hour, min, 0).unwrap()
}

/// An item titled `title` published at `hour:min`.
pub fn item(title: &str, hour: u32, min: u32) -> FeedItem {
    FeedItem::new(title).with_published_at(at(hour, min))
}

/// Fetcher returning whatever was last scripted for a URL.
///
/// Unscripted and failing URLs return an error.
#[derive(Default)]
pub struct FakeFetcher {
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn set(&self, url: &str, items: Vec<FeedItem>) {
        self.feeds.lock().unwrap().insert(url.to_string(), items);
    }

    pub fn fail(&self, url: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(url.to_string());
        } else {
            set.remove(url);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            return Err(RelayError::Feed(format!("HTTP error: 503 for {url}")));
        }
        self.feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RelayError::Feed(format!("no route to {url}")))
    }
}

/// A notification as received by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub group_id: i64,
    pub channel_id: i64,
    pub title: String,
    pub footer: String,
}

/// Messenger that records every send.
///
/// Channels listed as gone do not resolve.
#[derive(Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<Sent>>,
    gone: Mutex<HashSet<(i64, i64)>>,
}

impl FakeMessenger {
    pub fn remove_channel(&self, group_id: i64, channel_id: i64) {
        self.gone.lock().unwrap().insert((group_id, channel_id));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles_for(&self, group_id: i64, channel_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.group_id == group_id && s.channel_id == channel_id)
            .map(|s| s.title)
            .collect()
    }
}

#[async_trait]
impl ChannelResolver for FakeMessenger {
    async fn resolve(&self, group_id: i64, channel_id: i64) -> Option<Channel> {
        if self.gone.lock().unwrap().contains(&(group_id, channel_id)) {
            return None;
        }
        Some(Channel {
            group_id,
            channel_id,
            name: format!("channel-{channel_id}"),
            endpoint: String::new(),
        })
    }
}

#[async_trait]
impl MessageSender for FakeMessenger {
    async fn send(&self, channel: &Channel, notification: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            group_id: channel.group_id,
            channel_id: channel.channel_id,
            title: notification.title.clone(),
            footer: notification.footer.clone(),
        });
        Ok(())
    }
}

/// Service, poller and fakes wired together.
pub struct Relay {
    pub db: Arc<Database>,
    pub service: FeedService,
    pub poller: FeedPoller,
    pub fetcher: Arc<FakeFetcher>,
    pub messenger: Arc<FakeMessenger>,
}

/// Build a relay over a fresh in-memory database.
pub async fn relay() -> Relay {
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let service = FeedService::load(Arc::clone(&db)).await.unwrap();
    let fetcher = Arc::new(FakeFetcher::default());
    let messenger = Arc::new(FakeMessenger::default());
    let dispatcher = Dispatcher::new(messenger.clone(), messenger.clone());
    let poller = service.poller(fetcher.clone(), dispatcher);

    Relay {
        db,
        service,
        poller,
        fetcher,
        messenger,
    }
}
