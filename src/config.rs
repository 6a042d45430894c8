use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{AppError, Result};
use crate::utils::fs::ensure_parent_dir;

/// Minimum free space, in MB, required on the deduplicator's temp drive
/// before `link()` is allowed to touch the filesystem.
pub const DEFAULT_TMP_MIN_SPACE_MB: u64 = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub images_archive: Option<PathBuf>,
    pub video_archive: Option<PathBuf>,
    pub tmp_path: PathBuf,
    pub tmp_min_space_mb: u64,
}

impl Config {
    /// Reads `STORAGEMGR_DB_PATH`, `IMAGES_ARCHIVE`, `VIDEO_ARCHIVE`,
    /// `TMP_PATH`, `TMP_MIN_SPACE` from the environment, falling back to
    /// OS-appropriate defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let database_path = match env::var_os("STORAGEMGR_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };
        ensure_parent_dir(&database_path)?;

        let images_archive = env::var_os("IMAGES_ARCHIVE").map(PathBuf::from);
        let video_archive = env::var_os("VIDEO_ARCHIVE").map(PathBuf::from);

        let tmp_path = match env::var_os("TMP_PATH") {
            Some(path) => PathBuf::from(path),
            None => env::temp_dir(),
        };

        let tmp_min_space_mb = match env::var("TMP_MIN_SPACE") {
            Ok(value) => value
                .parse()
                .map_err(|_| AppError::Config(format!("invalid TMP_MIN_SPACE: {value}")))?,
            Err(_) => DEFAULT_TMP_MIN_SPACE_MB,
        };

        Ok(Self {
            database_path,
            images_archive,
            video_archive,
            tmp_path,
            tmp_min_space_mb,
        })
    }
}

fn default_database_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "storagemgr")
        .ok_or_else(|| AppError::Config("unable to determine data directory".into()))?;
    Ok(dirs.data_dir().join("catalog.sqlite3"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn from_env_uses_explicit_db_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("catalog.sqlite3");
        env::set_var("STORAGEMGR_DB_PATH", &db_path);
        env::remove_var("TMP_MIN_SPACE");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_path, db_path);
        assert_eq!(config.tmp_min_space_mb, DEFAULT_TMP_MIN_SPACE_MB);
        assert!(db_path.parent().unwrap().exists());

        env::remove_var("STORAGEMGR_DB_PATH");
    }

    #[test]
    fn from_env_parses_tmp_min_space() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        env::set_var("STORAGEMGR_DB_PATH", dir.path().join("catalog.sqlite3"));
        env::set_var("TMP_MIN_SPACE", "1024");

        let config = Config::from_env().unwrap();
        assert_eq!(config.tmp_min_space_mb, 1024);

        env::remove_var("STORAGEMGR_DB_PATH");
        env::remove_var("TMP_MIN_SPACE");
    }
}
