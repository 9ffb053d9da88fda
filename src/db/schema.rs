//! Database schema and migrations for feedrelay.
//!
//! Migrations are applied in order; the schema_version table records
//! which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Feed subscriptions
    r#"
CREATE TABLE feed_subscriptions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id    INTEGER NOT NULL,
    channel_id  INTEGER NOT NULL,
    url         TEXT NOT NULL,           -- normalized: trimmed, lower-cased
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (group_id, url)
);

CREATE INDEX idx_feed_subscriptions_group ON feed_subscriptions(group_id);
CREATE INDEX idx_feed_subscriptions_url ON feed_subscriptions(url);
"#,
];
