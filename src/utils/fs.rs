use std::fs;
use std::path::Path;

use crate::error::Result;

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_parent_dir_creates_missing_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("db.sqlite3");
        ensure_parent_dir(&nested).unwrap();
        assert!(nested.parent().unwrap().exists());
    }
}
