//! Selection of new feed items against a cursor.

use chrono::{DateTime, Utc};

use super::types::FeedItem;

/// Result of filtering one fetched batch.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Items to deliver, oldest first, paired with their timestamps.
    pub new_items: Vec<(DateTime<Utc>, FeedItem)>,
    /// Cursor after delivering every item in `new_items`.
    pub cursor: DateTime<Utc>,
    /// True when the feed had no cursor yet.
    pub first_poll: bool,
}

/// Select the items newer than `cursor`.
///
/// Items without a timestamp are dropped. The rest are ordered oldest first.
/// When `cursor` is `None` nothing is delivered and the returned cursor is
/// the newest timestamp in the batch, or `now` for an empty batch. Otherwise
/// an item is new iff its timestamp is strictly later than the cursor.
pub fn select_new_items(
    items: Vec<FeedItem>,
    cursor: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> FilterOutcome {
    let mut timed: Vec<(DateTime<Utc>, FeedItem)> = items
        .into_iter()
        .filter_map(|item| item.timestamp().map(|ts| (ts, item)))
        .collect();
    // Stable: equal timestamps keep feed order.
    timed.sort_by_key(|(ts, _)| *ts);

    let Some(cursor) = cursor else {
        let newest = timed.last().map(|(ts, _)| *ts).unwrap_or(now);
        return FilterOutcome {
            new_items: Vec::new(),
            cursor: newest,
            first_poll: true,
        };
    };

    let new_items: Vec<(DateTime<Utc>, FeedItem)> =
        timed.into_iter().filter(|(ts, _)| *ts > cursor).collect();
    let cursor = new_items.last().map(|(ts, _)| *ts).unwrap_or(cursor);

    FilterOutcome {
        new_items,
        cursor,
        first_poll: false,
    }
}
