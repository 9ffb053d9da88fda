//! feedrelay - syndication feed relay
//!
//! Polls RSS/Atom feeds and posts each new item to the chat channels
//! subscribed to it.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;

pub use config::Config;
pub use db::Database;
pub use error::{RelayError, Result};
pub use feed::{
    AddFeedResult, FeedPoller, FeedService, FeedSubscription, PollerHandle, SubscriptionRegistry,
};
