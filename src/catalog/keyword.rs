use std::collections::HashSet;

use rusqlite::OptionalExtension;

use super::{model::Keyword, Catalog};
use crate::error::Result;

impl Catalog {
    pub fn get_or_add_keyword(&self, name: &str) -> Result<Keyword> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, name FROM keyword WHERE name = ?1",
                [name],
                |row| {
                    Ok(Keyword {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;

        if let Some(keyword) = existing {
            return Ok(keyword);
        }

        conn.execute("INSERT INTO keyword (name) VALUES (?1)", [name])?;
        Ok(Keyword {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn keywords_for_file(&self, file_id: i64) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT k.name FROM keyword k
             JOIN file_keywords fk ON fk.keyword_id = k.id
             WHERE fk.file_id = ?1",
        )?;
        let names = stmt
            .query_map([file_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(names)
    }

    pub fn associate_keyword(&self, file_id: i64, keyword_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO file_keywords (file_id, keyword_id) VALUES (?1, ?2)",
            rusqlite::params![file_id, keyword_id],
        )?;
        Ok(())
    }

    fn dissociate_keyword(&self, file_id: i64, keyword_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM file_keywords WHERE file_id = ?1 AND keyword_id = ?2",
            rusqlite::params![file_id, keyword_id],
        )?;
        Ok(())
    }

    /// Reconciles the catalog's keyword associations for `file_id` to match
    /// `on_disk`, adding and removing associations symmetrically (spec
    /// §4.4's "Keyword delta writing").
    pub fn sync_file_keywords(&self, file_id: i64, on_disk: &HashSet<String>) -> Result<()> {
        let cataloged = self.keywords_for_file(file_id)?;

        for added in on_disk.difference(&cataloged) {
            let keyword = self.get_or_add_keyword(added)?;
            self.associate_keyword(file_id, keyword.id)?;
        }

        for removed in cataloged.difference(on_disk) {
            let keyword = self.get_or_add_keyword(removed)?;
            self.dissociate_keyword(file_id, keyword.id)?;
        }

        Ok(())
    }

    /// Count of distinct keywords ever recorded, for `sstats`.
    pub fn count_keywords(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM keyword", [], |row| row.get(0))?)
    }

    /// Adds every keyword in `new_keywords` not already associated with
    /// `file_id` (Archiver Branch B's keyword merge; never removes).
    pub fn merge_file_keywords(&self, file_id: i64, new_keywords: &HashSet<String>) -> Result<HashSet<String>> {
        let existing = self.keywords_for_file(file_id)?;
        for added in new_keywords.difference(&existing) {
            let keyword = self.get_or_add_keyword(added)?;
            self.associate_keyword(file_id, keyword.id)?;
        }
        self.keywords_for_file(file_id)
    }
}
