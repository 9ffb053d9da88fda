//! Feed types for feedrelay.

use std::fmt;

use chrono::{DateTime, Utc};

/// Maximum length of a notification title in characters.
pub const MAX_TITLE_LENGTH: usize = 256;

/// Maximum length of a notification description in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 2048;

/// Title used when a feed item has none.
pub const PLACEHOLDER_TITLE: &str = "-";

/// Default number of subscriptions a group may hold.
pub const DEFAULT_MAX_SUBSCRIPTIONS_PER_GROUP: usize = 10;

/// Default delay between polling passes in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Normalized feed URL.
///
/// Two subscriptions whose URLs normalize to the same key share one poll
/// and one cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedKey(String);

impl FeedKey {
    /// Normalize a raw URL: surrounding whitespace trimmed, lower-cased.
    pub fn normalize(url: &str) -> Self {
        Self(url.trim().to_lowercase())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FeedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A delivery target: one channel of one group interested in one feed.
///
/// Equality covers exactly `(group_id, channel_id, url)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Owning group ID.
    pub group_id: i64,
    /// Channel ID within the group.
    pub channel_id: i64,
    /// Normalized feed URL.
    pub url: FeedKey,
}

impl Subscription {
    /// Create a new subscription, normalizing the URL.
    pub fn new(group_id: i64, channel_id: i64, url: &str) -> Self {
        Self {
            group_id,
            channel_id,
            url: FeedKey::normalize(url),
        }
    }
}

/// A persisted subscription.
#[derive(Debug, Clone)]
pub struct FeedSubscription {
    /// Subscription ID. Ascending IDs give creation order.
    pub id: i64,
    /// Owning group ID.
    pub group_id: i64,
    /// Channel ID within the group.
    pub channel_id: i64,
    /// Normalized feed URL.
    pub url: String,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl FeedSubscription {
    /// The in-memory delivery target for this row.
    pub fn subscription(&self) -> Subscription {
        Subscription::new(self.group_id, self.channel_id, &self.url)
    }
}

/// A media enclosure attached to a feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEnclosure {
    /// Enclosure URL.
    pub url: String,
    /// Declared media type (e.g. `image/png`).
    pub media_type: Option<String>,
}

impl MediaEnclosure {
    /// Check whether the declared media type is an image.
    pub fn is_image(&self) -> bool {
        self.media_type
            .as_deref()
            .map(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

/// An item fetched from a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    /// Item title.
    pub title: String,
    /// Link to the original article.
    pub link: Option<String>,
    /// Raw item description (may contain HTML).
    pub description: Option<String>,
    /// When the item was published.
    pub published_at: Option<DateTime<Utc>>,
    /// When the item was last updated.
    pub updated_at: Option<DateTime<Utc>>,
    /// Media enclosure, if any.
    pub media: Option<MediaEnclosure>,
}

impl FeedItem {
    /// Create a new item.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the updated date.
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Set the media enclosure.
    pub fn with_media(mut self, url: impl Into<String>, media_type: impl Into<String>) -> Self {
        self.media = Some(MediaEnclosure {
            url: url.into(),
            media_type: Some(media_type.into()),
        });
        self
    }

    /// The timestamp used for ordering: publish date, else update date.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.updated_at)
    }
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Title (never empty).
    pub title: String,
    /// Link to the item.
    pub url: Option<String>,
    /// Plain-text description.
    pub description: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Provenance footer: the feed key.
    pub footer: String,
}

/// A resolved chat channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Owning group ID.
    pub group_id: i64,
    /// Channel ID.
    pub channel_id: i64,
    /// Display name.
    pub name: String,
    /// Where messages for this channel are sent.
    pub endpoint: String,
}
