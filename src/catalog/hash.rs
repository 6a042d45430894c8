use rusqlite::OptionalExtension;

use super::{model::Hash, now_rfc3339, Catalog};
use crate::error::Result;

impl Catalog {
    /// Finds the `Hash` row for `digest`, creating it on first observation.
    /// Hashes are never deleted once created.
    pub fn get_or_create_hash(&self, digest: &str) -> Result<Hash> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, digest FROM hash WHERE digest = ?1",
                [digest],
                |row| {
                    Ok(Hash {
                        id: row.get(0)?,
                        digest: row.get(1)?,
                    })
                },
            )
            .optional()?;

        if let Some(hash) = existing {
            return Ok(hash);
        }

        let now = now_rfc3339()?;
        conn.execute(
            "INSERT INTO hash (digest, created_at, modified_at) VALUES (?1, ?2, ?2)",
            rusqlite::params![digest, now],
        )?;
        Ok(Hash {
            id: conn.last_insert_rowid(),
            digest: digest.to_string(),
        })
    }

    pub fn get_hash(&self, id: i64) -> Result<Hash> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT id, digest FROM hash WHERE id = ?1",
            [id],
            |row| {
                Ok(Hash {
                    id: row.get(0)?,
                    digest: row.get(1)?,
                })
            },
        )?)
    }

    /// Every hash whose digest starts with `prefix`, for `manage-duplicates
    /// --show-hash`.
    pub fn find_hashes_by_prefix(&self, prefix: &str) -> Result<Vec<Hash>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, digest FROM hash WHERE digest LIKE ?1 || '%'")?;
        let rows = stmt.query_map([prefix], |row| {
            Ok(Hash {
                id: row.get(0)?,
                digest: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Every hash shared by two or more live, non-symlinked files — the
    /// working set `manage-duplicates` iterates over.
    pub fn hashes_with_live_duplicates(&self) -> Result<Vec<Hash>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT h.id, h.digest FROM hash h
             JOIN file f ON f.hash_id = h.id
             WHERE f.deleted IS NULL AND f.symbolic_link = 0
             GROUP BY h.id
             HAVING COUNT(*) > 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Hash {
                id: row.get(0)?,
                digest: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_hash_is_idempotent() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog.get_or_create_hash("abc123").unwrap();
        let second = catalog.get_or_create_hash("abc123").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn distinct_digests_get_distinct_rows() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.get_or_create_hash("aaa").unwrap();
        let b = catalog.get_or_create_hash("bbb").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn find_hashes_by_prefix_matches_leading_characters() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.get_or_create_hash("deadbeef").unwrap();
        catalog.get_or_create_hash("deadc0de").unwrap();
        catalog.get_or_create_hash("cafebabe").unwrap();

        let matches = catalog.find_hashes_by_prefix("dead").unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn hashes_with_live_duplicates_requires_two_live_non_symlinked_files() {
        let catalog = Catalog::open_in_memory().unwrap();
        let root = catalog.get_or_create_root("/r").unwrap();
        let rel = catalog
            .get_or_create_rel_path(std::path::Path::new("/r"), root.id, &root.path)
            .unwrap();
        let hash = catalog.get_or_create_hash("shared").unwrap();
        catalog
            .create_file("a.jpg", rel.id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        assert!(catalog.hashes_with_live_duplicates().unwrap().is_empty());

        catalog
            .create_file("b.jpg", rel.id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();
        assert_eq!(catalog.hashes_with_live_duplicates().unwrap().len(), 1);
    }
}
