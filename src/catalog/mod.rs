//! The persisted entity graph (spec §3): one `Catalog` struct wrapping a
//! `Mutex<Connection>`, directly modeled on the ancestor's single
//! `Database` type, just spread across one file per entity because this
//! domain has nine entity kinds instead of one flat inventory table.

pub mod exclude_dir;
pub mod file;
pub mod file_date;
pub mod hash;
pub mod keyword;
pub mod metadata_field;
pub mod model;
pub mod path_priority;
pub mod rel_path;
pub mod root_path;
mod schema;

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{AppError, Result};

pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

pub(crate) fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(AppError::time)
}

pub(crate) fn format_rfc3339(dt: OffsetDateTime) -> Result<String> {
    dt.format(&Rfc3339).map_err(AppError::time)
}

pub(crate) fn parse_rfc3339(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(AppError::time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migration_idempotently() {
        let catalog = Catalog::open_in_memory().unwrap();
        // Re-running migrate on the same connection must not error.
        let conn = catalog.conn.lock();
        super::schema::migrate(&conn).unwrap();
    }
}
