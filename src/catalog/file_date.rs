use time::OffsetDateTime;

use super::{format_rfc3339, Catalog};
use crate::error::Result;

impl Catalog {
    /// Records a recognized date tag for `file_id` and promotes it to the
    /// file's canonical `date`/`date_field`, since the most recently
    /// inserted `FileDate` is always canonical (spec §3).
    pub fn record_file_date(&self, file_id: i64, field_id: i64, date: OffsetDateTime) -> Result<()> {
        {
            let conn = self.conn.lock();
            let formatted = format_rfc3339(date)?;
            conn.execute(
                "INSERT INTO file_date (file_id, field_id, date) VALUES (?1, ?2, ?3)",
                rusqlite::params![file_id, field_id, formatted],
            )?;
        }
        self.set_canonical_date(file_id, field_id, date)
    }

    pub fn file_dates(&self, file_id: i64) -> Result<Vec<(i64, OffsetDateTime)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT field_id, date FROM file_date WHERE file_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([file_id], |row| {
            let field_id: i64 = row.get(0)?;
            let raw: String = row.get(1)?;
            Ok((field_id, raw))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (field_id, raw) = row?;
            out.push((field_id, super::parse_rfc3339(&raw)?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use time::macros::datetime;

    #[test]
    fn record_file_date_promotes_latest_to_canonical() {
        let catalog = Catalog::open_in_memory().unwrap();
        let root = catalog.get_or_create_root("/r").unwrap();
        let rel = catalog
            .get_or_create_rel_path(Path::new("/r"), root.id, &root.path)
            .unwrap();
        let hash = catalog.get_or_create_hash("abc").unwrap();
        let file = catalog
            .create_file("a.jpg", rel.id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        let field_a = catalog
            .get_or_create_metadata_field("Exif.Photo.DateTimeDigitized")
            .unwrap();
        let field_b = catalog
            .get_or_create_metadata_field("Exif.Photo.DateTimeOriginal")
            .unwrap();

        catalog
            .record_file_date(file.id, field_a.id, datetime!(2013-12-14 08:00:00 UTC))
            .unwrap();
        catalog
            .record_file_date(file.id, field_b.id, datetime!(2013-12-14 09:00:00 UTC))
            .unwrap();

        let stored = catalog.get_file(file.id).unwrap();
        assert_eq!(stored.date_field_id, Some(field_b.id));
        assert_eq!(stored.date.unwrap().hour(), 9);
        assert_eq!(catalog.file_dates(file.id).unwrap().len(), 2);
    }
}
