//! Canonical SQLite schema for the reference entity store.
//!
//! The layout mirrors the host model the engine is written against:
//! - `entities` / `users` are two id spaces (user ids may collide with
//!   content ids)
//! - `attributes` holds raw link payloads keyed by owner scope + id + key,
//!   with a dynamically typed value column (TEXT or BLOB per row)
//! - `classifications` is the host's term-link system
//! - `owners` is the intrinsic ownership column for computed-owner links
//! - `engine_state` is the single key/value slot for persisted reports

/// Migration v1: full store layout.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY CHECK (id > 0),
    kind TEXT NOT NULL CHECK (length(trim(kind)) > 0)
);

CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind, id);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY CHECK (id > 0)
);

CREATE TABLE IF NOT EXISTS attributes (
    scope TEXT NOT NULL CHECK (scope IN ('content', 'user')),
    owner_id INTEGER NOT NULL CHECK (owner_id > 0),
    key TEXT NOT NULL CHECK (length(trim(key)) > 0),
    -- No declared type: BLOB affinity keeps TEXT and BLOB payloads as-is.
    value,
    PRIMARY KEY (scope, owner_id, key)
);

CREATE TABLE IF NOT EXISTS classifications (
    scope TEXT NOT NULL CHECK (scope IN ('content', 'user')),
    owner_id INTEGER NOT NULL CHECK (owner_id > 0),
    taxonomy TEXT NOT NULL CHECK (length(trim(taxonomy)) > 0),
    term_id INTEGER NOT NULL CHECK (term_id > 0),
    PRIMARY KEY (scope, owner_id, taxonomy, term_id)
);

CREATE INDEX IF NOT EXISTS idx_classifications_term
    ON classifications(taxonomy, term_id, owner_id);

CREATE TABLE IF NOT EXISTS owners (
    entity_id INTEGER PRIMARY KEY CHECK (entity_id > 0),
    owner_id INTEGER NOT NULL CHECK (owner_id > 0)
);

CREATE TABLE IF NOT EXISTS engine_state (
    key TEXT PRIMARY KEY CHECK (length(trim(key)) > 0),
    value TEXT NOT NULL,
    updated_at_us INTEGER NOT NULL DEFAULT 0
);
";
