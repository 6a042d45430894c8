use rusqlite::OptionalExtension;

use super::{model::PathPriority, Catalog};
use crate::error::{AppError, Result};

impl Catalog {
    /// Records that `patha` has strictly higher dedup priority than
    /// `pathb`. Fails if the unordered pair already exists in either
    /// order — checked inside the same lock as the insert, since SQLite
    /// has no native unordered-pair constraint.
    pub fn save_path_priority(&self, patha_id: i64, pathb_id: i64) -> Result<PathPriority> {
        let conn = self.conn.lock();

        let reverse_exists: bool = conn
            .query_row(
                "SELECT 1 FROM path_priority WHERE (patha_id = ?1 AND pathb_id = ?2) OR (patha_id = ?2 AND pathb_id = ?1)",
                rusqlite::params![patha_id, pathb_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if reverse_exists {
            return Err(AppError::schema(format!(
                "path priority pair ({patha_id}, {pathb_id}) already recorded in some order"
            )));
        }

        conn.execute(
            "INSERT INTO path_priority (patha_id, pathb_id) VALUES (?1, ?2)",
            rusqlite::params![patha_id, pathb_id],
        )?;
        Ok(PathPriority {
            id: conn.last_insert_rowid(),
            patha_id,
            pathb_id,
        })
    }

    /// Idempotent variant of [`Catalog::save_path_priority`]: inserts
    /// `(winner, loser)` if neither order is already recorded, no-ops
    /// otherwise. Resolves spec §9's Open Question about
    /// `PathPriority.update_priorities`'s unfinished body — without this,
    /// the deduplicator's manual-resolve pass could never converge on
    /// repeat runs.
    pub fn update_priorities(&self, winner_path_id: i64, loser_path_id: i64) -> Result<()> {
        if winner_path_id == loser_path_id {
            return Ok(());
        }
        match self.save_path_priority(winner_path_id, loser_path_id) {
            Ok(_) | Err(AppError::SchemaViolation(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// +1 if `patha_id` has recorded priority over `pathb_id`, -1 for the
    /// reverse, 0 when unknown or the same path.
    pub fn prioritise(&self, patha_id: i64, pathb_id: i64) -> Result<i32> {
        if patha_id == pathb_id {
            return Ok(0);
        }
        let conn = self.conn.lock();

        let forward: bool = conn
            .query_row(
                "SELECT 1 FROM path_priority WHERE patha_id = ?1 AND pathb_id = ?2",
                rusqlite::params![patha_id, pathb_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if forward {
            return Ok(1);
        }

        let backward: bool = conn
            .query_row(
                "SELECT 1 FROM path_priority WHERE patha_id = ?1 AND pathb_id = ?2",
                rusqlite::params![pathb_id, patha_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if backward {
            return Ok(-1);
        }

        Ok(0)
    }
}
