//! Fan-out of notifications to subscribed channels.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use super::types::{Channel, Notification, Subscription};
use crate::Result;

/// Resolves a `(group, channel)` pair to a deliverable channel.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    /// Returns `None` when the group or channel no longer exists or is
    /// not accessible.
    async fn resolve(&self, group_id: i64, channel_id: i64) -> Option<Channel>;
}

/// Sends a rendered notification to a channel.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `notification` to `channel`.
    async fn send(&self, channel: &Channel, notification: &Notification) -> Result<()>;
}

/// Counts for one dispatched notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sends that succeeded.
    pub delivered: usize,
    /// Subscriptions whose channel could not be resolved.
    pub skipped: usize,
    /// Sends that failed.
    pub failed: usize,
}

impl DispatchReport {
    /// Add another report's counts to this one.
    pub fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

enum Outcome {
    Delivered,
    Skipped,
    Failed,
}

/// Delivers notifications to every subscriber of a feed.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn ChannelResolver>,
    sender: Arc<dyn MessageSender>,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(resolver: Arc<dyn ChannelResolver>, sender: Arc<dyn MessageSender>) -> Self {
        Self { resolver, sender }
    }

    /// Send `notification` to each subscriber.
    ///
    /// Sends are issued concurrently and awaited together. Unresolvable
    /// targets are skipped; a failed send does not affect the others.
    pub async fn dispatch(
        &self,
        subscribers: &[Subscription],
        notification: &Notification,
    ) -> DispatchReport {
        let sends = subscribers
            .iter()
            .map(|sub| self.deliver_one(sub, notification));

        let mut report = DispatchReport::default();
        for outcome in join_all(sends).await {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        report
    }

    async fn deliver_one(&self, sub: &Subscription, notification: &Notification) -> Outcome {
        let Some(channel) = self.resolver.resolve(sub.group_id, sub.channel_id).await else {
            debug!(
                "Channel {}/{} not resolvable, skipping {}",
                sub.group_id, sub.channel_id, sub.url
            );
            return Outcome::Skipped;
        };

        match self.sender.send(&channel, notification).await {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                warn!(
                    group_id = sub.group_id,
                    channel_id = sub.channel_id,
                    feed = %sub.url,
                    "Failed to deliver notification: {}",
                    e
                );
                Outcome::Failed
            }
        }
    }
}
