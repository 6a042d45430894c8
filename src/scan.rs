//! Reconciles the catalog with the on-disk state of a rooted subtree (spec
//! §4.4). Grounded on the ancestor `scan.rs`'s `perform_scan`: its
//! `existing_map`/`to_process` reuse-vs-rehash split is the direct ancestor
//! of `needs_rehash` here, generalized from rebuilding one flat inventory
//! table to reconciling per-directory against the catalog's `RelPath`-scoped
//! `File` rows.

use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::path::Path;

use crate::catalog::model::{File, RootPath};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::fingerprint::{self, digest};
use crate::metadata_reader::{self, FIELD_DATE_TIME, FIELD_DATE_TIME_DIGITIZED, FIELD_DATE_TIME_ORIGINAL, FIELD_VIDEO_CREATION_DATE};
use crate::utils::time::system_time_to_seconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Re-fingerprint only when `mtime` or `size` on disk differ from the
    /// cataloged row.
    Quick,
    /// Re-fingerprint every live file unconditionally.
    Full,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanSummary {
    pub directories_visited: usize,
    pub files_added: usize,
    pub files_rehashed: usize,
    pub files_deleted: usize,
}

impl ScanSummary {
    fn merge(&mut self, other: ScanSummary) {
        self.directories_visited += other.directories_visited;
        self.files_added += other.files_added;
        self.files_rehashed += other.files_rehashed;
        self.files_deleted += other.files_deleted;
    }
}

/// Scans `root`, reconciling every directory under it with the catalog.
pub fn scan_root(catalog: &Catalog, root: &RootPath, mode: ScanMode) -> Result<ScanSummary> {
    let excludes = catalog.compiled_excludes_for_root(root.id)?;
    let root_dir = Path::new(&root.path);
    if !root_dir.exists() {
        tracing::error!(root = %root.path, "root path missing from filesystem, skipping");
        return Ok(ScanSummary::default());
    }
    scan_directory(catalog, root, root_dir, mode, &excludes)
}

fn scan_directory(
    catalog: &Catalog,
    root: &RootPath,
    dir_abspath: &Path,
    mode: ScanMode,
    excludes: &[regex::Regex],
) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    let rel_path = catalog.get_or_create_rel_path(dir_abspath, root.id, &root.path)?;
    let abspath_str = dir_abspath.to_string_lossy();
    if excludes.iter().any(|re| re.is_match(&abspath_str)) {
        return Ok(summary);
    }

    summary.directories_visited += 1;

    let entries = match fs::read_dir(dir_abspath) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(dir = %dir_abspath.display(), error = ?err, "failed to read directory");
            return Ok(summary);
        }
    };

    let mut known: HashMap<String, File> = catalog
        .list_live_files_in_rel_path(rel_path.id)?
        .into_iter()
        .map(|file| (file.name.clone(), file))
        .collect();

    let mut subdirectories = Vec::new();

    let mut paths: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::error!(path = %path.display(), error = ?err, "failed to stat entry");
                continue;
            }
        };

        if metadata.is_dir() {
            subdirectories.push(path);
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            tracing::error!(path = %path.display(), "non-utf8 file name, skipping");
            continue;
        };

        if let Some(existing) = known.remove(&name) {
            if needs_rehash(mode, &existing, &metadata) {
                if let Err(err) = update_details(catalog, &existing, &path, &metadata) {
                    tracing::error!(path = %path.display(), error = ?err, "failed to rehash file, skipping");
                    continue;
                }
                summary.files_rehashed += 1;
            }
        } else {
            match create_and_update(catalog, rel_path.id, &name, &path, &metadata) {
                Ok(()) => summary.files_added += 1,
                Err(err) => {
                    tracing::error!(path = %path.display(), error = ?err, "failed to ingest new file, skipping");
                }
            }
        }
    }

    for (_, leftover) in known {
        catalog.mark_deleted(leftover.id)?;
        summary.files_deleted += 1;
    }

    for subdir in subdirectories {
        let nested = scan_directory(catalog, root, &subdir, mode, excludes)?;
        summary.merge(nested);
    }

    Ok(summary)
}

fn needs_rehash(mode: ScanMode, existing: &File, metadata: &Metadata) -> bool {
    match mode {
        ScanMode::Full => true,
        ScanMode::Quick => {
            let size_changed = metadata.len() != existing.size;
            let mtime_changed = metadata
                .modified()
                .ok()
                .and_then(|m| system_time_to_seconds(m).ok())
                .map(|secs| (secs - existing.mtime).abs() > f64::EPSILON)
                .unwrap_or(true);
            size_changed || mtime_changed
        }
    }
}

fn create_and_update(
    catalog: &Catalog,
    rel_path_id: i64,
    name: &str,
    path: &Path,
    metadata: &Metadata,
) -> Result<()> {
    let digest_value = digest(path)?;
    let hash = catalog.get_or_create_hash(&digest_value)?;
    let size = metadata.len();
    let mtime = system_time_to_seconds(metadata.modified()?)?;
    let symbolic_link = metadata.file_type().is_symlink();

    let file = catalog.create_file(name, rel_path_id, hash.id, hash.id, size, mtime, symbolic_link)?;
    update_metadata(catalog, &file, path)
}

fn update_details(catalog: &Catalog, existing: &File, path: &Path, metadata: &Metadata) -> Result<()> {
    let digest_value = digest(path)?;
    let hash = catalog.get_or_create_hash(&digest_value)?;
    let size = metadata.len();
    let mtime = system_time_to_seconds(metadata.modified()?)?;
    let symbolic_link = metadata.file_type().is_symlink();

    catalog.update_file_stat(existing.id, hash.id, size, mtime, symbolic_link)?;
    update_metadata(catalog, existing, path)
}

/// Updates EXIF-derived keywords and dates for `file` ("`file_update_metadata`"
/// in spec §4.4), and the container creation date for videos. Shared with
/// the archiver, which runs the same bookkeeping right after copying a
/// freshly ingested file into place.
pub(crate) fn update_metadata(catalog: &Catalog, file: &File, path: &Path) -> Result<()> {
    if fingerprint::is_image_extension(path) {
        if let Some(image_metadata) = metadata_reader::read_image(path) {
            catalog.sync_file_keywords(file.id, &image_metadata.keywords)?;

            for field_name in [FIELD_DATE_TIME_DIGITIZED, FIELD_DATE_TIME_ORIGINAL, FIELD_DATE_TIME] {
                if let Some(raw) = image_metadata.date_tags.get(field_name) {
                    match metadata_reader::parse_exif_date(raw) {
                        Some(parsed) => {
                            let field = catalog.get_or_create_metadata_field(field_name)?;
                            catalog.record_file_date(file.id, field.id, parsed)?;
                        }
                        None => tracing::warn!(path = %path.display(), field = field_name, raw, "malformed EXIF date"),
                    }
                }
            }
        }
    } else if fingerprint::is_video_extension(path) {
        if let Some(created) = metadata_reader::video_creation_date(path) {
            let field = catalog.get_or_create_metadata_field(FIELD_VIDEO_CREATION_DATE)?;
            catalog.record_file_date(file.id, field.id, created)?;
        }
    }

    Ok(())
}
