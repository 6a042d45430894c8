//! SQL schema and migration runner, modeled on the ancestor `db.rs`'s
//! `PRAGMA user_version`-gated migration step.

use rusqlite::Connection;

use crate::error::Result;

const CURRENT_SCHEMA_VERSION: i64 = 1;

const MIGRATION_V1: &str = r#"
CREATE TABLE hash (
    id INTEGER PRIMARY KEY,
    digest TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE root_path (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE rel_path (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    root_id INTEGER NOT NULL REFERENCES root_path(id),
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    UNIQUE(path, root_id)
);

CREATE TABLE exclude_dir (
    id INTEGER PRIMARY KEY,
    regex TEXT NOT NULL,
    root_id INTEGER REFERENCES root_path(id),
    UNIQUE(regex, root_id)
);

CREATE TABLE metadata_field (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE file (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    rel_path_id INTEGER NOT NULL REFERENCES rel_path(id),
    hash_id INTEGER NOT NULL REFERENCES hash(id),
    original_hash_id INTEGER NOT NULL REFERENCES hash(id),
    size INTEGER NOT NULL,
    mtime REAL NOT NULL,
    date TEXT,
    date_field_id INTEGER REFERENCES metadata_field(id),
    symbolic_link INTEGER NOT NULL DEFAULT 0,
    deduped INTEGER NOT NULL DEFAULT 0,
    deleted TEXT,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

-- Enforces the "at most one live row per (rel_path, name)" invariant at the
-- storage layer, not just in application code.
CREATE UNIQUE INDEX file_live_unique ON file(rel_path_id, name) WHERE deleted IS NULL;
CREATE INDEX file_hash_idx ON file(hash_id);
CREATE INDEX file_original_hash_idx ON file(original_hash_id);

CREATE TABLE keyword (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE file_keywords (
    file_id INTEGER NOT NULL REFERENCES file(id),
    keyword_id INTEGER NOT NULL REFERENCES keyword(id),
    PRIMARY KEY (file_id, keyword_id)
);

CREATE TABLE file_date (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES file(id),
    field_id INTEGER NOT NULL REFERENCES metadata_field(id),
    date TEXT NOT NULL
);

-- Unordered-pair uniqueness for (patha, pathb) is enforced in
-- `PathPriority::save`, inside the same transaction as the insert, since
-- SQLite has no native unordered-pair constraint.
CREATE TABLE path_priority (
    id INTEGER PRIMARY KEY,
    patha_id INTEGER NOT NULL REFERENCES rel_path(id),
    pathb_id INTEGER NOT NULL REFERENCES rel_path(id)
);
"#;

pub fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(MIGRATION_V1)?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    Ok(())
}
