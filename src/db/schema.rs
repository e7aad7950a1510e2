//! Database schema definitions and migrations

pub const SCHEMA_VERSION: i32 = 1;

/// Initial schema creation SQL
pub const CREATE_TABLES: &str = r#"
-- Product tickets (aggregate root)
-- version is bumped on every committed write and guards against stale snapshots.
CREATE TABLE IF NOT EXISTS tickets (
    id TEXT PRIMARY KEY NOT NULL,
    ticket_number TEXT NOT NULL UNIQUE,
    product_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT' CHECK(status IN ('DRAFT', 'SUBMITTED', 'IN_PROCESS', 'NPDI_INITIATED', 'COMPLETED', 'CANCELED')),
    priority TEXT NOT NULL DEFAULT 'MEDIUM' CHECK(priority IN ('LOW', 'MEDIUM', 'HIGH', 'URGENT')),
    base_number TEXT,
    npdi_tracking_json TEXT,
    sku_variants_json TEXT NOT NULL DEFAULT '[]',

    -- Role-specific sub-documents, stored as opaque JSON
    pricing_data_json TEXT NOT NULL DEFAULT 'null',
    chemical_properties_json TEXT NOT NULL DEFAULT 'null',
    quality_json TEXT NOT NULL DEFAULT '{}',
    composition_json TEXT NOT NULL DEFAULT 'null',
    corpbase_json TEXT NOT NULL DEFAULT 'null',
    hazard_json TEXT NOT NULL DEFAULT 'null',

    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);

-- Append-only status history. seq is the entry's position in the ticket's history.
CREATE TABLE IF NOT EXISTS status_history (
    id TEXT PRIMARY KEY NOT NULL,
    ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    action TEXT NOT NULL,
    status TEXT NOT NULL,
    changed_at TEXT NOT NULL,
    changed_by TEXT NOT NULL,
    changed_by_role TEXT NOT NULL CHECK(changed_by_role IN ('PRODUCT_MANAGER', 'PM_OPS', 'ADMIN')),
    reason TEXT,
    details_json TEXT,
    UNIQUE(ticket_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_history_ticket ON status_history(ticket_id, seq);

-- Comments table
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY NOT NULL,
    ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    author_email TEXT NOT NULL,
    author_role TEXT NOT NULL CHECK(author_role IN ('PRODUCT_MANAGER', 'PM_OPS', 'ADMIN')),
    body TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_comments_ticket ON comments(ticket_id);

-- Per-year counters for draft ticket numbers. Never reset, so numbers freed
-- by an NPDI rename are not handed out again.
CREATE TABLE IF NOT EXISTS ticket_sequences (
    year INTEGER PRIMARY KEY NOT NULL,
    last_value INTEGER NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
