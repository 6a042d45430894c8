use regex::Regex;
use rusqlite::OptionalExtension;

use super::{model::ExcludeDir, Catalog};
use crate::error::{AppError, Result};

impl Catalog {
    /// `root_id = None` applies the pattern to every root.
    pub fn add_exclude_dir(&self, regex: &str, root_id: Option<i64>) -> Result<ExcludeDir> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, regex, root_id FROM exclude_dir WHERE regex = ?1 AND root_id IS ?2",
                rusqlite::params![regex, root_id],
                |row| {
                    Ok(ExcludeDir {
                        id: row.get(0)?,
                        regex: row.get(1)?,
                        root_id: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(existing) = existing {
            return Ok(existing);
        }

        conn.execute(
            "INSERT INTO exclude_dir (regex, root_id) VALUES (?1, ?2)",
            rusqlite::params![regex, root_id],
        )?;
        Ok(ExcludeDir {
            id: conn.last_insert_rowid(),
            regex: regex.to_string(),
            root_id,
        })
    }

    /// Union of patterns that apply to `root_id`: global patterns
    /// (`root_id IS NULL`) plus this root's own.
    pub fn compiled_excludes_for_root(&self, root_id: i64) -> Result<Vec<Regex>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT regex FROM exclude_dir WHERE root_id IS NULL OR root_id = ?1")?;
        let patterns = stmt
            .query_map([root_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        patterns
            .into_iter()
            .map(|pattern| Regex::new(&pattern).map_err(|err| AppError::parse(err.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_and_root_specific_patterns_both_apply() {
        let catalog = Catalog::open_in_memory().unwrap();
        let root = catalog.get_or_create_root("/media/photos").unwrap();
        let other_root = catalog.get_or_create_root("/media/videos").unwrap();

        catalog.add_exclude_dir(r"\.git$", None).unwrap();
        catalog.add_exclude_dir(r"/tmp$", Some(root.id)).unwrap();
        catalog.add_exclude_dir(r"/cache$", Some(other_root.id)).unwrap();

        let patterns = catalog.compiled_excludes_for_root(root.id).unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().any(|r| r.is_match("/media/photos/.git")));
        assert!(patterns.iter().any(|r| r.is_match("/media/photos/tmp")));
        assert!(!patterns.iter().any(|r| r.is_match("/media/videos/cache")));
    }

    #[test]
    fn add_exclude_dir_is_idempotent() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.add_exclude_dir(r"\.git$", None).unwrap();
        let b = catalog.add_exclude_dir(r"\.git$", None).unwrap();
        assert_eq!(a.id, b.id);
    }
}
