use rusqlite::OptionalExtension;

use super::{model::MetadataField, Catalog};
use crate::error::Result;

impl Catalog {
    pub fn get_or_create_metadata_field(&self, name: &str) -> Result<MetadataField> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT id, name FROM metadata_field WHERE name = ?1",
                [name],
                |row| {
                    Ok(MetadataField {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;

        if let Some(field) = existing {
            return Ok(field);
        }

        conn.execute("INSERT INTO metadata_field (name) VALUES (?1)", [name])?;
        Ok(MetadataField {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_metadata_field_is_idempotent() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog
            .get_or_create_metadata_field("Exif.Photo.DateTimeOriginal")
            .unwrap();
        let b = catalog
            .get_or_create_metadata_field("Exif.Photo.DateTimeOriginal")
            .unwrap();
        assert_eq!(a.id, b.id);
    }
}
