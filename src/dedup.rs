//! Collapses a set of files sharing a fingerprint down to one canonical
//! survivor, replacing the rest with symlinks (spec §4.6). The
//! "repeat-until-fixed-point" auto-resolve pass is a while-changed loop per
//! spec §9's Design Notes; the free-space check before `link()` is grounded
//! on the ancestor's `system.rs::disk_status` (`fs2::available_space`), now
//! gating a real filesystem mutation instead of feeding a GUI panel.

use std::path::{Path, PathBuf};

use crate::catalog::model::File;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{AppError, Result};

/// Chooses the survivor among files the auto-resolve pass could not settle.
/// Returns the index into `files` to keep.
pub type KeepCallback<'a> = dyn Fn(&[File]) -> usize + 'a;

#[derive(Debug, Default, Clone, Copy)]
pub struct DedupOutcome {
    pub auto_resolved: usize,
    pub manually_resolved: usize,
}

pub fn deduplicate_hash(
    catalog: &Catalog,
    config: &Config,
    hash_id: i64,
    keep_callback: &KeepCallback<'_>,
) -> Result<DedupOutcome> {
    let mut outcome = DedupOutcome::default();
    let mut set = catalog.live_non_symlinked_files_for_hash(hash_id)?;
    if set.len() <= 1 {
        return Ok(outcome);
    }

    auto_resolve(catalog, config, &mut set, &mut outcome)?;

    if set.len() > 1 {
        let survivor_index = keep_callback(&set);
        let survivor = set[survivor_index].clone();
        for (index, loser) in set.iter().enumerate() {
            if index == survivor_index {
                continue;
            }
            catalog.update_priorities(survivor.rel_path_id, loser.rel_path_id)?;
            link(catalog, config, loser, &survivor)?;
            outcome.manually_resolved += 1;
        }
    }

    Ok(outcome)
}

fn auto_resolve(
    catalog: &Catalog,
    config: &Config,
    set: &mut Vec<File>,
    outcome: &mut DedupOutcome,
) -> Result<()> {
    loop {
        let mut changed = false;

        'search: for i in 0..set.len() {
            for j in 0..set.len() {
                if i == j {
                    continue;
                }
                let verdict = catalog.prioritise(set[i].rel_path_id, set[j].rel_path_id)?;
                if verdict == 1 {
                    let loser = set[j].clone();
                    let winner = set[i].clone();
                    link(catalog, config, &loser, &winner)?;
                    set.remove(j);
                    outcome.auto_resolved += 1;
                    changed = true;
                    break 'search;
                }
            }
        }

        if !changed || set.len() <= 1 {
            break;
        }
    }
    Ok(())
}

/// Replaces `from`'s on-disk file with a symlink pointing at `to`, stashing
/// a safety copy in the configured temp drive first.
fn link(catalog: &Catalog, config: &Config, from: &File, to: &File) -> Result<()> {
    let available_mb = fs2::available_space(&config.tmp_path)? / (1024 * 1024);
    if available_mb < config.tmp_min_space_mb {
        return Err(AppError::fatal(format!(
            "insufficient free space on temp drive: {available_mb} MB available, {} MB required",
            config.tmp_min_space_mb
        )));
    }

    let from_rel = catalog.rel_path_by_id(from.rel_path_id)?;
    let from_abspath = PathBuf::from(catalog.rel_path_abspath(&from_rel)?).join(&from.name);

    let to_rel = catalog.rel_path_by_id(to.rel_path_id)?;
    let to_abspath = PathBuf::from(catalog.rel_path_abspath(&to_rel)?).join(&to.name);

    stash_safety_copy(config, &from_abspath)?;

    std::fs::remove_file(&from_abspath)?;
    symlink(&to_abspath, &from_abspath)?;

    catalog.deduplicated(from.id)
}

fn stash_safety_copy(config: &Config, abspath: &Path) -> Result<()> {
    let stash_root = config.tmp_path.join("storagemgr");
    let relative = abspath.strip_prefix(Path::new("/")).unwrap_or(abspath);
    let stash_path = stash_root.join(relative);
    if let Some(parent) = stash_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(abspath, &stash_path)?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link_path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link_path)?;
    Ok(())
}

#[cfg(windows)]
fn symlink(target: &Path, link_path: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn test_config(tmp_path: PathBuf) -> Config {
        Config {
            database_path: tmp_path.join("db.sqlite3"),
            images_archive: None,
            video_archive: None,
            tmp_path,
            tmp_min_space_mb: 0,
        }
    }

    fn setup_duplicate_pair() -> (Catalog, Config, tempfile::TempDir, i64) {
        let catalog = Catalog::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let tmp_dir = tempdir().unwrap();
        let config = test_config(tmp_dir.path().to_path_buf());

        let root = catalog
            .get_or_create_root(&dir.path().to_string_lossy())
            .unwrap();
        let rel = catalog
            .get_or_create_rel_path(dir.path(), root.id, &root.path)
            .unwrap();

        fs::write(dir.path().join("a.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("b.jpg"), b"same bytes").unwrap();

        let hash = catalog.get_or_create_hash("shareddigest").unwrap();
        catalog
            .create_file("a.jpg", rel.id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();
        catalog
            .create_file("b.jpg", rel.id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        (catalog, config, dir, hash.id)
    }

    #[test]
    fn single_file_set_is_a_no_op() {
        let catalog = Catalog::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        let hash = catalog.get_or_create_hash("solo").unwrap();

        let outcome = deduplicate_hash(&catalog, &config, hash.id, &|_| 0).unwrap();
        assert_eq!(outcome.auto_resolved, 0);
        assert_eq!(outcome.manually_resolved, 0);
    }

    #[test]
    fn manual_resolve_links_loser_to_winner_and_records_priority() {
        let (catalog, config, dir, hash_id) = setup_duplicate_pair();

        let outcome = deduplicate_hash(&catalog, &config, hash_id, &|_files| 0).unwrap();
        assert_eq!(outcome.manually_resolved, 1);

        let remaining = catalog.live_non_symlinked_files_for_hash(hash_id).unwrap();
        assert_eq!(remaining.len(), 1);

        let b_path = dir.path().join("b.jpg");
        let link_metadata = fs::symlink_metadata(&b_path).unwrap();
        assert!(link_metadata.file_type().is_symlink());
    }

    #[test]
    fn auto_resolve_uses_learned_priority_on_second_pass() {
        let (catalog, config, dir, hash_id) = setup_duplicate_pair();
        deduplicate_hash(&catalog, &config, hash_id, &|_files| 0).unwrap();

        // Recreate the duplicate the way a fresh scan would after restoring
        // the file manually; the learned PathPriority should auto-resolve
        // without consulting keep_callback this time.
        fs::write(dir.path().join("b.jpg"), b"same bytes").unwrap();
        let root = catalog.get_or_create_root(&dir.path().to_string_lossy()).unwrap();
        let rel = catalog.get_or_create_rel_path(dir.path(), root.id, &root.path).unwrap();
        let hash = catalog.get_hash(hash_id).unwrap();
        catalog
            .create_file("b.jpg", rel.id, hash.id, hash.id, 10, 0.0, false)
            .unwrap();

        let called = std::cell::Cell::new(false);
        let outcome = deduplicate_hash(&catalog, &config, hash_id, &|_files| {
            called.set(true);
            0
        })
        .unwrap();

        assert_eq!(outcome.auto_resolved, 1);
        assert!(!called.get());
    }
}
