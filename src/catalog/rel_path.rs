use std::path::Path;

use pathdiff::diff_paths;
use rusqlite::OptionalExtension;

use super::model::RelPath;
use super::{now_rfc3339, Catalog};
use crate::error::{AppError, Result};
use crate::utils::path::to_posix_string;

impl Catalog {
    /// Finds or creates the persisted `RelPath` for `abs_path` under
    /// `root_path`. `abs_path` must lie under `root_path`.
    pub fn get_or_create_rel_path(&self, abs_path: &Path, root_id: i64, root_path: &str) -> Result<RelPath> {
        let relative = relative_component(abs_path, root_path)?;
        self.get_or_create_rel_path_component(&relative, root_id)
    }

    fn get_or_create_rel_path_component(&self, path: &str, root_id: i64) -> Result<RelPath> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, path, root_id FROM rel_path WHERE path = ?1 AND root_id = ?2",
                rusqlite::params![path, root_id],
                |row| {
                    Ok(RelPath {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        root_id: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(rel_path) = existing {
            return Ok(rel_path);
        }

        let now = now_rfc3339()?;
        conn.execute(
            "INSERT INTO rel_path (path, root_id, created_at, modified_at) VALUES (?1, ?2, ?3, ?3)",
            rusqlite::params![path, root_id, now],
        )?;
        Ok(RelPath {
            id: conn.last_insert_rowid(),
            path: path.to_string(),
            root_id,
        })
    }

    pub fn rel_path_by_id(&self, rel_path_id: i64) -> Result<RelPath> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT id, path, root_id FROM rel_path WHERE id = ?1",
            [rel_path_id],
            |row| {
                Ok(RelPath {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    root_id: row.get(2)?,
                })
            },
        )?)
    }

    pub fn rel_path_abspath(&self, rel_path: &RelPath) -> Result<String> {
        let conn = self.conn.lock();
        let root: String = conn.query_row(
            "SELECT path FROM root_path WHERE id = ?1",
            [rel_path.root_id],
            |row| row.get(0),
        )?;
        Ok(join_root_and_rel(&root, &rel_path.path))
    }
}

fn relative_component(abs_path: &Path, root_path: &str) -> Result<String> {
    let root = Path::new(root_path);
    let diff = diff_paths(abs_path, root).ok_or_else(|| {
        AppError::schema(format!(
            "{} is not under root {root_path}",
            abs_path.display()
        ))
    })?;
    Ok(to_posix_string(&diff).into_owned())
}

fn join_root_and_rel(root: &str, rel: &str) -> String {
    if rel.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), rel)
    }
}
