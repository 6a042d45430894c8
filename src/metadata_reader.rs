//! EXIF/IPTC/XMP and video-container metadata, read and written by shelling
//! out to `exiftool` and `mediainfo` the way `pens-catalog_1a`'s
//! `catalog/exiftool.rs` wraps `exiftool` for its own metadata work. These
//! binaries are the spec's named "image-metadata library" and
//! "video-metadata library" external collaborators.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Command;

use regex::Regex;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::warn;

use crate::error::Result;

/// Canonical `MetadataField` names, matching the Exiv2-style identifiers the
/// catalog stores (`Exif.Photo.DateTimeOriginal` and friends), independent
/// of whatever friendly name `exiftool` prints them under.
pub const FIELD_DATE_TIME_DIGITIZED: &str = "Exif.Photo.DateTimeDigitized";
pub const FIELD_DATE_TIME_ORIGINAL: &str = "Exif.Photo.DateTimeOriginal";
pub const FIELD_DATE_TIME: &str = "Exif.Image.DateTime";
/// Not an EXIF tag — the catalog's name for a video container's earliest
/// recognized creation-date field.
pub const FIELD_VIDEO_CREATION_DATE: &str = "Video.CreationDate";

const EXIF_DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");

pub struct ImageMetadata {
    pub date_tags: HashMap<String, String>,
    pub keywords: HashSet<String>,
}

/// Reads EXIF dates and IPTC/XMP keywords from an image via `exiftool -j`.
/// Returns `None` on any read failure (missing binary, non-zero exit,
/// unparsable JSON) — the caller treats that exactly like "no metadata".
pub fn read_image(path: &Path) -> Option<ImageMetadata> {
    let output = Command::new("exiftool")
        .args([
            "-j",
            "-DateTimeOriginal",
            "-CreateDate",
            "-ModifyDate",
            "-IPTC:Keywords",
            "-XMP-microsoft:LastKeywordXMP",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
    let entry = parsed.as_array()?.first()?;

    let mut date_tags = HashMap::new();
    if let Some(value) = entry.get("DateTimeOriginal").and_then(|v| v.as_str()) {
        date_tags.insert(FIELD_DATE_TIME_ORIGINAL.to_string(), value.to_string());
    }
    if let Some(value) = entry.get("CreateDate").and_then(|v| v.as_str()) {
        date_tags.insert(FIELD_DATE_TIME_DIGITIZED.to_string(), value.to_string());
    }
    if let Some(value) = entry.get("ModifyDate").and_then(|v| v.as_str()) {
        date_tags.insert(FIELD_DATE_TIME.to_string(), value.to_string());
    }

    let mut keywords = HashSet::new();
    collect_string_values(entry.get("Keywords"), &mut keywords);
    collect_string_values(entry.get("LastKeywordXMP"), &mut keywords);

    Some(ImageMetadata { date_tags, keywords })
}

fn collect_string_values(value: Option<&serde_json::Value>, out: &mut HashSet<String>) {
    match value {
        Some(serde_json::Value::String(s)) => {
            out.insert(s.clone());
        }
        Some(serde_json::Value::Array(items)) => {
            for item in items {
                if let Some(s) = item.as_str() {
                    out.insert(s.to_string());
                }
            }
        }
        _ => {}
    }
}

/// Replaces `Iptc.Application2.Keywords` with `keywords`. `exiftool` writes
/// to a temp file and renames over the original, so this is atomic without
/// extra locking on our side.
pub fn write_image_keywords(path: &Path, keywords: &[String]) -> Result<()> {
    let mut args = vec![
        "-overwrite_original".to_string(),
        "-IPTC:Keywords=".to_string(),
    ];
    for keyword in keywords {
        args.push(format!("-IPTC:Keywords+={keyword}"));
    }

    let output = Command::new("exiftool")
        .args(&args)
        .arg(path)
        .output()?;

    if !output.status.success() {
        return Err(crate::error::AppError::Fatal(format!(
            "exiftool failed to write keywords to {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Reads the EXIF `Make`/`Model` tags for `filter-images --model`. Returns
/// `None` on any read failure, same contract as [`read_image`].
pub fn read_make_model(path: &Path) -> Option<String> {
    let output = Command::new("exiftool")
        .args(["-j", "-Make", "-Model"])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
    let entry = parsed.as_array()?.first()?;
    let make = entry.get("Make").and_then(|v| v.as_str()).unwrap_or("");
    let model = entry.get("Model").and_then(|v| v.as_str()).unwrap_or("");
    if make.is_empty() && model.is_empty() {
        return None;
    }
    Some(format!("{make} {model}").trim().to_string())
}

/// Parses an EXIF date string in `"YYYY:MM:DD HH:MM:SS"` form. Malformed
/// values are not fatal: the caller logs and drops them.
pub fn parse_exif_date(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim_matches('\0').trim();
    PrimitiveDateTime::parse(trimmed, EXIF_DATE_FORMAT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Earliest recognized date field in a video container's metadata, as
/// reported by `mediainfo`, filtering out the common default-epoch value.
/// Mirrors `original_source/storagemgr/storage/mediainfo.py::earliest_date`.
pub fn video_creation_date(path: &Path) -> Option<OffsetDateTime> {
    let output = Command::new("mediainfo").arg(path).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let values = date_field_values(&text);

    values
        .iter()
        .filter_map(|raw| parse_mediainfo_date(raw))
        .filter(|dt| dt.year() > 1904)
        .min()
}

/// Collects every value from a `mediainfo` text report whose key contains
/// `"date"`, the way the original's `filter_values('date')` does.
fn date_field_values(report: &str) -> Vec<String> {
    let mut values = Vec::new();
    for line in report.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().contains("date") {
            values.push(value.trim().to_string());
        }
    }
    values
}

fn timestamp_abbrev_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<tz>[A-Z]{2,4}) (?P<y>\d{4})-(?P<mo>\d{2})-(?P<d>\d{2}) (?P<h>\d{2}):(?P<mi>\d{2}):(?P<s>\d{2})$")
            .unwrap()
    })
}

fn timestamp_iso_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<y>\d{4})-(?P<mo>\d{2})-(?P<d>\d{2})T(?P<h>\d{2}):(?P<mi>\d{2}):(?P<s>\d{2})(?P<sign>[+-])(?P<oh>\d{2})(?P<om>\d{2})$")
            .unwrap()
    })
}

/// Parses the two video timestamp forms named in the spec: `TZA
/// YYYY-MM-DD HH:MM:SS` (timezone-abbreviation prefix) and ISO
/// `YYYY-MM-DDTHH:MM:SS+hhmm`.
fn parse_mediainfo_date(raw: &str) -> Option<OffsetDateTime> {
    if let Some(caps) = timestamp_abbrev_regex().captures(raw) {
        let offset = tz_abbrev_offset_seconds(&caps["tz"]);
        return build_offset_datetime(&caps["y"], &caps["mo"], &caps["d"], &caps["h"], &caps["mi"], &caps["s"], offset);
    }

    if let Some(caps) = timestamp_iso_regex().captures(raw) {
        let sign = if &caps["sign"] == "-" { -1 } else { 1 };
        let oh: i32 = caps["oh"].parse().ok()?;
        let om: i32 = caps["om"].parse().ok()?;
        let offset = sign * (oh * 3600 + om * 60);
        return build_offset_datetime(&caps["y"], &caps["mo"], &caps["d"], &caps["h"], &caps["mi"], &caps["s"], offset);
    }

    None
}

fn tz_abbrev_offset_seconds(tz: &str) -> i32 {
    match tz {
        "UTC" | "GMT" | "UT" => 0,
        other => {
            warn!(tz = other, "unrecognized timezone abbreviation, assuming UTC");
            0
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_offset_datetime(
    y: &str,
    mo: &str,
    d: &str,
    h: &str,
    mi: &str,
    s: &str,
    offset_seconds: i32,
) -> Option<OffsetDateTime> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let naive = format!("{y}-{mo}-{d} {h}:{mi}:{s}");
    let parsed = PrimitiveDateTime::parse(&naive, format).ok()?;
    let utc = parsed.assume_utc();
    Some(utc - time::Duration::seconds(i64::from(offset_seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exif_date_parses_valid_value() {
        let parsed = parse_exif_date("2013:12:14 08:49:00").unwrap();
        assert_eq!(parsed.year(), 2013);
        assert_eq!(u8::from(parsed.month()), 12);
        assert_eq!(parsed.day(), 14);
    }

    #[test]
    fn parse_exif_date_rejects_malformed_value() {
        assert!(parse_exif_date("not a date").is_none());
        assert!(parse_exif_date("2013/12/14 08:49:00").is_none());
    }

    #[test]
    fn date_field_values_matches_keys_containing_date() {
        let report = "General\nComplete name : movie.mp4\nEncoded date : UTC 2013-12-14 08:49:00\nVideo\nWidth : 1920\nTagged date : UTC 2013-12-14 08:49:05\n";
        let values = date_field_values(report);
        assert_eq!(values, vec!["UTC 2013-12-14 08:49:00", "UTC 2013-12-14 08:49:05"]);
    }

    #[test]
    fn parse_mediainfo_date_handles_abbrev_form() {
        let dt = parse_mediainfo_date("UTC 2013-12-14 08:49:00").unwrap();
        assert_eq!(dt.year(), 2013);
    }

    #[test]
    fn parse_mediainfo_date_handles_iso_form() {
        let dt = parse_mediainfo_date("2013-12-14T08:49:00+0100").unwrap();
        assert_eq!(dt.year(), 2013);
        // 08:49 at +01:00 is 07:49 UTC.
        assert_eq!(dt.hour(), 7);
    }

    #[test]
    fn parse_mediainfo_date_rejects_unrecognized_form() {
        assert!(parse_mediainfo_date("December 14 2013").is_none());
    }

    #[test]
    fn video_creation_date_filters_default_epoch_and_picks_earliest() {
        // Exercise the pure filtering logic without invoking `mediainfo`.
        let values = vec![
            "UTC 1904-01-01 00:00:00".to_string(),
            "UTC 2013-12-14 08:49:05".to_string(),
            "UTC 2013-12-14 08:49:00".to_string(),
        ];
        let earliest = values
            .iter()
            .filter_map(|raw| parse_mediainfo_date(raw))
            .filter(|dt| dt.year() > 1904)
            .min()
            .unwrap();
        assert_eq!(earliest.hour(), 8);
        assert_eq!(earliest.minute(), 49);
        assert_eq!(earliest.second(), 0);
    }
}
