//! Feed relay core.
//!
//! This module tracks which channels subscribe to which feeds, polls the
//! feeds in the background and delivers each new item once to every
//! subscriber.

pub mod cursor;
pub mod dispatch;
pub mod fetcher;
pub mod filter;
pub mod poller;
pub mod registry;
pub mod render;
pub mod repository;
pub mod service;
pub mod types;
pub mod webhook;

pub use cursor::CursorStore;
pub use dispatch::{ChannelResolver, DispatchReport, Dispatcher, MessageSender};
pub use fetcher::{parse_feed, validate_url, FeedFetcher, HttpFeedFetcher};
pub use filter::{select_new_items, FilterOutcome};
pub use poller::{FeedPoller, PassReport, PollerHandle};
pub use registry::SubscriptionRegistry;
pub use render::render;
pub use repository::SubscriptionRepository;
pub use service::{AddFeedResult, FeedService};
pub use types::{
    Channel, FeedItem, FeedKey, FeedSubscription, MediaEnclosure, Notification, Subscription,
    DEFAULT_MAX_SUBSCRIPTIONS_PER_GROUP, DEFAULT_POLL_INTERVAL_SECS, MAX_DESCRIPTION_LENGTH,
    MAX_TITLE_LENGTH, PLACEHOLDER_TITLE,
};
pub use webhook::WebhookMessenger;
