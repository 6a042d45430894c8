use rusqlite::OptionalExtension;

use super::{model::RootPath, now_rfc3339, Catalog};
use crate::error::Result;

impl Catalog {
    pub fn get_or_create_root(&self, path: &str) -> Result<RootPath> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, path FROM root_path WHERE path = ?1",
                [path],
                |row| {
                    Ok(RootPath {
                        id: row.get(0)?,
                        path: row.get(1)?,
                    })
                },
            )
            .optional()?;

        if let Some(root) = existing {
            return Ok(root);
        }

        let now = now_rfc3339()?;
        conn.execute(
            "INSERT INTO root_path (path, created_at, modified_at) VALUES (?1, ?2, ?2)",
            rusqlite::params![path, now],
        )?;
        Ok(RootPath {
            id: conn.last_insert_rowid(),
            path: path.to_string(),
        })
    }

    pub fn list_roots(&self) -> Result<Vec<RootPath>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, path FROM root_path ORDER BY path")?;
        let rows = stmt.query_map([], |row| {
            Ok(RootPath {
                id: row.get(0)?,
                path: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn remove_root(&self, path: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM root_path WHERE path = ?1", [path])?;
        Ok(())
    }

    /// Scans every known root and returns the one whose `path` is a prefix
    /// of `abs_path`, preferring the longest match when several roots are
    /// nested inside each other.
    pub fn find_owning_root(&self, abs_path: &str) -> Result<Option<RootPath>> {
        let roots = self.list_roots()?;
        Ok(roots
            .into_iter()
            .filter(|root| abs_path.starts_with(root.path.as_str()))
            .max_by_key(|root| root.path.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_root_is_idempotent() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.get_or_create_root("/media/photos").unwrap();
        let b = catalog.get_or_create_root("/media/photos").unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn find_owning_root_prefers_longest_prefix() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.get_or_create_root("/media").unwrap();
        catalog.get_or_create_root("/media/photos").unwrap();

        let owner = catalog
            .find_owning_root("/media/photos/2013/img.png")
            .unwrap()
            .unwrap();
        assert_eq!(owner.path, "/media/photos");
    }

    #[test]
    fn find_owning_root_returns_none_when_unowned() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.get_or_create_root("/media/photos").unwrap();
        assert!(catalog.find_owning_root("/other/place").unwrap().is_none());
    }
}
