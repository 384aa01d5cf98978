//! Database schema and migrations for feedcast.
//!
//! Migrations are applied in order when the database is opened.
//! The schema_version table tracks which migrations have been applied.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Idempotency records for enqueued items
    r#"
-- One row per (channel, item); never updated, never deleted
CREATE TABLE idempotency_records (
    channel     TEXT NOT NULL,           -- 'post' or 'broadcast'
    id          TEXT NOT NULL,           -- SHA-256 of the entry URL
    entry_url   TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (channel, id)
);
"#,
    // v2: Registered push-notification subscribers
    r#"
CREATE TABLE subscribers (
    id          TEXT PRIMARY KEY,        -- SHA-256 of the token
    token       TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v3: Singleton live status records
    r#"
CREATE TABLE live_status (
    id          TEXT PRIMARY KEY,
    is_live     INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v4: Newest entry URL seen per source
    r#"
CREATE TABLE latest_entries (
    code        TEXT PRIMARY KEY,
    url         TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v5: Persisted task queue
    r#"
CREATE TABLE tasks (
    id            TEXT PRIMARY KEY,
    queue_name    TEXT NOT NULL,
    path          TEXT NOT NULL,
    payload       TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',  -- 'pending', 'running', 'done', 'dead'
    attempts      INTEGER NOT NULL DEFAULT 0,
    available_at  INTEGER NOT NULL,                 -- unix seconds
    lease_until   INTEGER,                          -- unix seconds, set while running
    last_error    TEXT,
    created_at    TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_tasks_status_available ON tasks(status, available_at);
"#,
    // v6: One-shot reminders broadcast at a given minute
    r#"
CREATE TABLE reminders (
    id             TEXT PRIMARY KEY,
    text           TEXT NOT NULL,
    remind_at      TEXT NOT NULL,         -- UTC
    enabled        INTEGER NOT NULL DEFAULT 1,
    notified_for   TEXT,                  -- local minute of the last broadcast
    created_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_reminders_enabled ON reminders(enabled, remind_at);
"#,
];
