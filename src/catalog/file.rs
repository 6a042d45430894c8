use rusqlite::{OptionalExtension, Row};
use time::OffsetDateTime;

use super::{format_rfc3339, model::File, now_rfc3339, parse_rfc3339, Catalog};
use crate::error::Result;

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<File> {
    let date: Option<String> = row.get(6)?;
    let deleted: Option<String> = row.get(10)?;
    Ok(File {
        id: row.get(0)?,
        name: row.get(1)?,
        rel_path_id: row.get(2)?,
        hash_id: row.get(3)?,
        original_hash_id: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
        mtime: row.get(9)?,
        date: date.map(|raw| parse_rfc3339(&raw)).transpose().map_err(|_| {
            rusqlite::Error::InvalidColumnType(6, "date".into(), rusqlite::types::Type::Text)
        })?,
        date_field_id: row.get(7)?,
        symbolic_link: row.get::<_, i64>(8)? != 0,
        deduped: row.get::<_, i64>(11)? != 0,
        deleted: deleted.map(|raw| parse_rfc3339(&raw)).transpose().map_err(|_| {
            rusqlite::Error::InvalidColumnType(10, "deleted".into(), rusqlite::types::Type::Text)
        })?,
    })
}

const SELECT_COLUMNS: &str = "id, name, rel_path_id, hash_id, original_hash_id, size, date, date_field_id, symbolic_link, mtime, deleted, deduped";

impl Catalog {
    #[allow(clippy::too_many_arguments)]
    pub fn create_file(
        &self,
        name: &str,
        rel_path_id: i64,
        hash_id: i64,
        original_hash_id: i64,
        size: u64,
        mtime: f64,
        symbolic_link: bool,
    ) -> Result<File> {
        let conn = self.conn.lock();
        let now = now_rfc3339()?;
        conn.execute(
            "INSERT INTO file (name, rel_path_id, hash_id, original_hash_id, size, mtime, symbolic_link, deduped, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
            rusqlite::params![name, rel_path_id, hash_id, original_hash_id, size as i64, mtime, symbolic_link as i64, now],
        )?;
        Ok(File {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            rel_path_id,
            hash_id,
            original_hash_id,
            size,
            mtime,
            date: None,
            date_field_id: None,
            symbolic_link,
            deduped: false,
            deleted: None,
        })
    }

    pub fn find_live_file(&self, rel_path_id: i64, name: &str) -> Result<Option<File>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM file WHERE rel_path_id = ?1 AND name = ?2 AND deleted IS NULL"
        );
        conn.query_row(&sql, rusqlite::params![rel_path_id, name], row_to_file)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_live_files_in_rel_path(&self, rel_path_id: i64) -> Result<Vec<File>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM file WHERE rel_path_id = ?1 AND deleted IS NULL"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([rel_path_id], row_to_file)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Every live, non-symlinked file sharing `hash_id` as either its
    /// current or original hash, excluding `exclude_file_id` (the
    /// candidate itself, when it is already cataloged).
    pub fn find_live_matches_by_hash(&self, hash_id: i64, exclude_file_id: Option<i64>) -> Result<Vec<File>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM file
             WHERE deleted IS NULL AND (hash_id = ?1 OR original_hash_id = ?1) AND id IS NOT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![hash_id, exclude_file_id], row_to_file)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Every live, non-symlinked file sharing `hash_id`, for the
    /// deduplicator's working set `S`.
    pub fn live_non_symlinked_files_for_hash(&self, hash_id: i64) -> Result<Vec<File>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM file WHERE deleted IS NULL AND symbolic_link = 0 AND hash_id = ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([hash_id], row_to_file)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Count of live `File` rows, for `sstats`.
    pub fn count_live_files(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM file WHERE deleted IS NULL", [], |row| row.get(0))?)
    }

    pub fn get_file(&self, file_id: i64) -> Result<File> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM file WHERE id = ?1");
        conn.query_row(&sql, [file_id], row_to_file).map_err(Into::into)
    }

    pub fn mark_deleted(&self, file_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_rfc3339()?;
        conn.execute(
            "UPDATE file SET deleted = ?2, modified_at = ?2 WHERE id = ?1",
            rusqlite::params![file_id, now],
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_file_stat(
        &self,
        file_id: i64,
        hash_id: i64,
        size: u64,
        mtime: f64,
        symbolic_link: bool,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_rfc3339()?;
        conn.execute(
            "UPDATE file SET hash_id = ?2, size = ?3, mtime = ?4, symbolic_link = ?5, modified_at = ?6 WHERE id = ?1",
            rusqlite::params![file_id, hash_id, size as i64, mtime, symbolic_link as i64, now],
        )?;
        Ok(())
    }

    /// Sets the canonical `date`/`date_field` to the most recently
    /// recorded `FileDate` (spec §3's "canonical `File.date` is the most
    /// recently written one").
    pub fn set_canonical_date(&self, file_id: i64, field_id: i64, date: OffsetDateTime) -> Result<()> {
        let conn = self.conn.lock();
        let formatted = format_rfc3339(date)?;
        let now = now_rfc3339()?;
        conn.execute(
            "UPDATE file SET date = ?2, date_field_id = ?3, modified_at = ?4 WHERE id = ?1",
            rusqlite::params![file_id, formatted, field_id, now],
        )?;
        Ok(())
    }

    /// Marks `file_id` as deduplicated: it is now a symlink pointing at
    /// another live file with the same content.
    pub fn deduplicated(&self, file_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_rfc3339()?;
        conn.execute(
            "UPDATE file SET symbolic_link = 1, deduped = 1, modified_at = ?2 WHERE id = ?1",
            rusqlite::params![file_id, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn new_catalog_with_root() -> (Catalog, i64) {
        let catalog = Catalog::open_in_memory().unwrap();
        let root = catalog.get_or_create_root("/r").unwrap();
        let rel = catalog
            .get_or_create_rel_path(Path::new("/r"), root.id, &root.path)
            .unwrap();
        (catalog, rel.id)
    }

    #[test]
    fn find_live_file_ignores_soft_deleted_rows() {
        let (catalog, rel_id) = new_catalog_with_root();
        let hash = catalog.get_or_create_hash("abc").unwrap();
        let file = catalog
            .create_file("a.jpg", rel_id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        assert!(catalog.find_live_file(rel_id, "a.jpg").unwrap().is_some());
        catalog.mark_deleted(file.id).unwrap();
        assert!(catalog.find_live_file(rel_id, "a.jpg").unwrap().is_none());
    }

    #[test]
    fn zero_length_file_invariant_maps_to_reserved_digest() {
        let (catalog, rel_id) = new_catalog_with_root();
        let hash = catalog
            .get_or_create_hash(crate::fingerprint::ZERO_LENGTH_DIGEST)
            .unwrap();
        let file = catalog
            .create_file("empty.dat", rel_id, hash.id, hash.id, 0, 0.0, false)
            .unwrap();

        let stored = catalog.get_file(file.id).unwrap();
        let stored_hash = catalog.get_hash(stored.hash_id).unwrap();
        assert_eq!(stored_hash.digest, crate::fingerprint::ZERO_LENGTH_DIGEST);
    }

    #[test]
    fn find_live_matches_by_hash_excludes_candidate() {
        let (catalog, rel_id) = new_catalog_with_root();
        let hash = catalog.get_or_create_hash("shared").unwrap();
        let a = catalog
            .create_file("a.jpg", rel_id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();
        let b = catalog
            .create_file("b.jpg", rel_id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        let matches = catalog
            .find_live_matches_by_hash(hash.id, Some(a.id))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, b.id);
    }

    #[test]
    fn count_live_files_excludes_soft_deleted() {
        let (catalog, rel_id) = new_catalog_with_root();
        let hash = catalog.get_or_create_hash("abc").unwrap();
        let file = catalog
            .create_file("a.jpg", rel_id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();
        assert_eq!(catalog.count_live_files().unwrap(), 1);

        catalog.mark_deleted(file.id).unwrap();
        assert_eq!(catalog.count_live_files().unwrap(), 0);
    }

    #[test]
    fn deduplicated_sets_symbolic_link_and_deduped() {
        let (catalog, rel_id) = new_catalog_with_root();
        let hash = catalog.get_or_create_hash("shared").unwrap();
        let file = catalog
            .create_file("a.jpg", rel_id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        catalog.deduplicated(file.id).unwrap();
        let stored = catalog.get_file(file.id).unwrap();
        assert!(stored.symbolic_link);
        assert!(stored.deduped);
    }
}
