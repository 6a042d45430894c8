//! Ingests an external tree into the canonical chronological layout,
//! deduplicating on ingest and merging keywords into existing matches (spec
//! §4.5). The "class hierarchy `Archiver → Image/Video`" redesign flag is
//! implemented as [`ArchivePolicy`], an injected strategy value — no
//! inheritance. Grounded on the ancestor's `plan.rs` (bucket/rename
//! computation) and `execute.rs` (copy-with-validation).

use std::path::Path;

use filetime::FileTime;
use time::OffsetDateTime;
use walkdir::WalkDir;

use crate::catalog::model::RootPath;
use crate::catalog::Catalog;
use crate::error::{AppError, Result};
use crate::fingerprint::{self, digest};
use crate::metadata_reader::{self, FIELD_DATE_TIME, FIELD_DATE_TIME_ORIGINAL};
use crate::scan::update_metadata;
use crate::utils::time::{basename_timestamp, from_unix_seconds, system_time_to_seconds};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub struct ArchivePolicy {
    pub name: &'static str,
    pub accepts: fn(&Path) -> bool,
    pub date_of: fn(&Path) -> Option<OffsetDateTime>,
    pub rename: fn(&Path, OffsetDateTime) -> Result<String>,
}

pub fn image_policy() -> ArchivePolicy {
    ArchivePolicy {
        name: "image",
        accepts: fingerprint::is_image_extension,
        date_of: image_date_of,
        rename: image_rename,
    }
}

pub fn video_policy() -> ArchivePolicy {
    ArchivePolicy {
        name: "video",
        accepts: fingerprint::is_video_extension,
        date_of: video_date_of,
        rename: video_rename,
    }
}

pub fn media_policy() -> ArchivePolicy {
    ArchivePolicy {
        name: "media",
        accepts: media_accepts,
        date_of: combined_date_of,
        rename: combined_rename,
    }
}

pub fn files_policy() -> ArchivePolicy {
    ArchivePolicy {
        name: "files",
        accepts: |_| true,
        date_of: combined_date_of,
        rename: combined_rename,
    }
}

fn media_accepts(path: &Path) -> bool {
    fingerprint::is_image_extension(path) || fingerprint::is_video_extension(path)
}

fn image_date_of(path: &Path) -> Option<OffsetDateTime> {
    let metadata = metadata_reader::read_image(path)?;
    for field in [FIELD_DATE_TIME_ORIGINAL, FIELD_DATE_TIME] {
        if let Some(raw) = metadata.date_tags.get(field) {
            if let Some(parsed) = metadata_reader::parse_exif_date(raw) {
                return Some(parsed);
            }
        }
    }
    None
}

fn video_date_of(path: &Path) -> Option<OffsetDateTime> {
    metadata_reader::video_creation_date(path)
}

fn combined_date_of(path: &Path) -> Option<OffsetDateTime> {
    if fingerprint::is_image_extension(path) {
        image_date_of(path)
    } else if fingerprint::is_video_extension(path) {
        video_date_of(path)
    } else {
        None
    }
}

fn image_rename(path: &Path, date: OffsetDateTime) -> Result<String> {
    let ext = fingerprint::extension_lower(path).unwrap_or_default();
    let (ts, micros) = basename_timestamp(date)?;
    Ok(format!("IMG-{ts}-{micros}.{ext}"))
}

fn video_rename(path: &Path, date: OffsetDateTime) -> Result<String> {
    let ext = fingerprint::extension_lower(path).unwrap_or_default();
    let (ts, micros) = basename_timestamp(date)?;
    Ok(format!("VID-{ts}-{micros}.{ext}"))
}

fn generic_rename(path: &Path, _date: OffsetDateTime) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::internal(format!("non-utf8 file name: {}", path.display())))
}

fn combined_rename(path: &Path, date: OffsetDateTime) -> Result<String> {
    if fingerprint::is_image_extension(path) {
        image_rename(path, date)
    } else if fingerprint::is_video_extension(path) {
        video_rename(path, date)
    } else {
        generic_rename(path, date)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveOutcome {
    pub added: usize,
    pub merged: usize,
    pub skipped: usize,
}

/// Ingests every file under `src_dir` matching `policy.accepts` into
/// `dest_dir`, which must lie under the catalog's `dest_root`.
pub fn archive_tree(
    catalog: &Catalog,
    policy: &ArchivePolicy,
    src_dir: &Path,
    dest_root: &RootPath,
    dest_dir: &Path,
    break_on_add: bool,
) -> Result<ArchiveOutcome> {
    let mut outcome = ArchiveOutcome::default();

    for entry in WalkDir::new(src_dir).follow_links(false).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !(policy.accepts)(path) {
            outcome.skipped += 1;
            continue;
        }

        let digest_value = match digest(path) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(path = %path.display(), error = ?err, "failed to fingerprint candidate, skipping");
                outcome.skipped += 1;
                continue;
            }
        };

        let hash = catalog.get_or_create_hash(&digest_value)?;
        let matches = catalog.find_live_matches_by_hash(hash.id, None)?;

        if matches.is_empty() {
            if break_on_add {
                tracing::info!(path = %path.display(), "break-on-add: pausing before ingest");
                return Ok(outcome);
            }
            match archive_new_content(catalog, policy, path, &hash.digest, dest_root, dest_dir) {
                Ok(()) => outcome.added += 1,
                Err(err) => {
                    tracing::error!(path = %path.display(), error = ?err, "fatal error archiving candidate");
                    return Err(err);
                }
            }
        } else {
            merge_keywords_into_matches(catalog, path, &matches)?;
            outcome.merged += 1;
        }
    }

    Ok(outcome)
}

fn archive_new_content(
    catalog: &Catalog,
    policy: &ArchivePolicy,
    src_path: &Path,
    digest_value: &str,
    dest_root: &RootPath,
    dest_dir: &Path,
) -> Result<()> {
    let metadata = std::fs::metadata(src_path)?;
    let fdate = (policy.date_of)(src_path)
        .or_else(|| from_unix_seconds(system_time_to_seconds(metadata.modified().ok()?).ok()?).ok())
        .ok_or_else(|| AppError::fatal(format!("unable to determine a date for {}", src_path.display())))?;

    let basename = (policy.rename)(src_path, fdate)?;
    let bucket = dest_dir.join(format!("{:04}", fdate.year())).join(month_bucket(fdate));
    std::fs::create_dir_all(&bucket)?;

    let final_name = avoid_collision(&bucket, &basename);
    let dest_path = bucket.join(&final_name);

    copy_with_validation(src_path, &dest_path, &metadata)?;

    let dest_rel_path = catalog.get_or_create_rel_path(&bucket, dest_root.id, &dest_root.path)?;
    let hash = catalog.get_or_create_hash(digest_value)?;
    let file = catalog.create_file(
        &final_name,
        dest_rel_path.id,
        hash.id,
        hash.id,
        metadata.len(),
        system_time_to_seconds(metadata.modified()?)?,
        false,
    )?;
    update_metadata(catalog, &file, &dest_path)?;

    tracing::info!(
        source = %src_path.display(),
        name = %final_name,
        digest = digest_value,
        "added"
    );
    Ok(())
}

fn merge_keywords_into_matches(
    catalog: &Catalog,
    src_path: &Path,
    matches: &[crate::catalog::model::File],
) -> Result<()> {
    let Some(candidate_metadata) = metadata_reader::read_image(src_path) else {
        return Ok(());
    };

    for existing in matches {
        let existing_keywords = catalog.keywords_for_file(existing.id)?;
        let new_keywords: std::collections::HashSet<String> = candidate_metadata
            .keywords
            .difference(&existing_keywords)
            .cloned()
            .collect();
        if new_keywords.is_empty() {
            continue;
        }

        let merged = catalog.merge_file_keywords(existing.id, &new_keywords)?;
        let existing_abspath = catalog.rel_path_abspath(&catalog_rel_path(catalog, existing.rel_path_id)?)?;
        let mut ordered: Vec<String> = merged.into_iter().collect();
        ordered.sort();
        metadata_reader::write_image_keywords(Path::new(&existing_abspath).join(&existing.name).as_path(), &ordered)?;
    }
    Ok(())
}

fn catalog_rel_path(catalog: &Catalog, rel_path_id: i64) -> Result<crate::catalog::model::RelPath> {
    // Tiny indirection kept local to this module: merge_keywords_into_matches
    // only needs the rel_path's own abspath, not a general lookup-by-id API.
    catalog.rel_path_by_id(rel_path_id)
}

fn month_bucket(date: OffsetDateTime) -> String {
    let month_index = u8::from(date.month()) as usize - 1;
    format!("{:02}{}", u8::from(date.month()), MONTH_ABBREVIATIONS[month_index])
}

fn avoid_collision(dir: &Path, basename: &str) -> String {
    let candidate_path = dir.join(basename);
    if !candidate_path.exists() {
        return basename.to_string();
    }

    let (stem, ext) = split_extension(basename);
    let mut n = 1;
    loop {
        let candidate = if ext.is_empty() {
            format!("{stem}-{n}")
        } else {
            format!("{stem}-{n}.{ext}")
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

fn split_extension(basename: &str) -> (&str, &str) {
    match basename.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (basename, ""),
    }
}

fn copy_with_validation(src: &Path, dest: &Path, src_metadata: &std::fs::Metadata) -> Result<()> {
    std::fs::copy(src, dest)?;

    let src_mtime = FileTime::from_last_modification_time(src_metadata);
    filetime::set_file_mtime(dest, src_mtime)
        .map_err(|err| AppError::fatal(format!("failed to preserve mtime on {}: {err}", dest.display())))?;

    let dest_metadata = std::fs::metadata(dest)?;
    if dest_metadata.len() == 0 {
        return Err(AppError::fatal(format!("copy produced zero-length file at {}", dest.display())));
    }
    if dest_metadata.len() != src_metadata.len() {
        return Err(AppError::fatal(format!(
            "copy size mismatch for {}: source {} dest {}",
            dest.display(),
            src_metadata.len(),
            dest_metadata.len()
        )));
    }

    let dest_mtime = FileTime::from_last_modification_time(&dest_metadata);
    if dest_mtime.unix_seconds() != src_mtime.unix_seconds() {
        return Err(AppError::fatal(format!(
            "copy mtime mismatch for {}",
            dest.display()
        )));
    }

    Ok(())
}
