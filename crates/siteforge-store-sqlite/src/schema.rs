//! SQL schema for the siteforge SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sites (
    site_id        TEXT PRIMARY KEY,   -- provider id, or 'pending-<hex>' placeholder
    status         TEXT NOT NULL
                   CHECK (status IN ('creating', 'progress', 'completed', 'failed', 'expired')),
    task_id        TEXT,               -- set only while status = 'progress'
    site_url       TEXT,
    admin_username TEXT,
    admin_password TEXT,
    admin_url      TEXT,
    session_hash   TEXT,
    is_pool        INTEGER,            -- NULL = provider undecided
    is_reserved    INTEGER NOT NULL DEFAULT 1,
    is_shared      INTEGER NOT NULL DEFAULT 0,
    expiry_hours   INTEGER,
    expires_at     TEXT,               -- ISO 8601 UTC; ephemeral sites only
    template_slug  TEXT NOT NULL,
    plan_id        INTEGER,
    order_id       TEXT,
    user_id        TEXT,
    source         TEXT,
    raw_response   TEXT,               -- last raw provider payload (JSON)
    error_message  TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Append-only. Rows follow their site through a re-key.
CREATE TABLE IF NOT EXISTS site_history (
    entry_id    TEXT PRIMARY KEY,
    site_id     TEXT NOT NULL
                REFERENCES sites(site_id) ON UPDATE CASCADE ON DELETE CASCADE,
    event       TEXT NOT NULL,
    payload     TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

-- Single-flight guard for the reconciler.
CREATE TABLE IF NOT EXISTS leases (
    name       TEXT PRIMARY KEY,
    holder     TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sites_pending_idx
    ON sites(status, created_at) WHERE task_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS sites_order_idx   ON sites(order_id);
CREATE INDEX IF NOT EXISTS sites_user_idx    ON sites(user_id);
CREATE INDEX IF NOT EXISTS sites_expires_idx
    ON sites(expires_at) WHERE expires_at IS NOT NULL;
CREATE INDEX IF NOT EXISTS site_history_site_idx
    ON site_history(site_id, recorded_at);

PRAGMA user_version = 1;
";
