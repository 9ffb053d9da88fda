//! Per-feed "last delivered" cursors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::types::FeedKey;

/// In-memory cursor store.
///
/// A missing entry means the feed has never been polled. Cursors only move
/// forward.
#[derive(Debug, Default)]
pub struct CursorStore {
    cursors: RwLock<HashMap<FeedKey, DateTime<Utc>>>,
}

impl CursorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cursor for a feed.
    pub async fn get(&self, key: &FeedKey) -> Option<DateTime<Utc>> {
        self.cursors.read().await.get(key).copied()
    }

    /// Set the cursor for a feed that has none yet.
    ///
    /// Returns the cursor in effect afterwards, which is the existing value
    /// if another caller initialized it first.
    pub async fn initialize(&self, key: &FeedKey, at: DateTime<Utc>) -> DateTime<Utc> {
        *self.cursors.write().await.entry(key.clone()).or_insert(at)
    }

    /// Move the cursor forward to `at`.
    ///
    /// Returns false, leaving the cursor untouched, if `at` is not later
    /// than the current value.
    pub async fn advance(&self, key: &FeedKey, at: DateTime<Utc>) -> bool {
        let mut cursors = self.cursors.write().await;
        match cursors.get(key) {
            Some(current) if *current >= at => false,
            _ => {
                cursors.insert(key.clone(), at);
                true
            }
        }
    }

    /// Number of feeds with a cursor.
    pub async fn len(&self) -> usize {
        self.cursors.read().await.len()
    }

    /// Check whether no cursor has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.cursors.read().await.is_empty()
    }
}
