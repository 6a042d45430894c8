use std::time::SystemTime;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{AppError, Result};

/// Converts a filesystem `SystemTime` into fractional seconds since the
/// Unix epoch, the `mtime` representation the catalog stores (spec §3:
/// `mtime: float seconds`).
pub fn system_time_to_seconds(time: SystemTime) -> Result<f64> {
    let duration = time
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|err| AppError::Time(err.to_string()))?;
    Ok(duration.as_secs_f64())
}

/// `YYYYMMDD-HHMMSS` component of the canonical archive basename.
const BASENAME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");

/// Formats `dt` for use in `IMG-YYYYMMDD-HHMMSS-<microsecond>.ext` /
/// `VID-...` basenames. Microseconds are returned separately since `time`
/// has no single specifier for them alongside this date shape.
pub fn basename_timestamp(dt: OffsetDateTime) -> Result<(String, u32)> {
    let formatted = dt.format(BASENAME_FORMAT).map_err(AppError::time)?;
    Ok((formatted, dt.microsecond()))
}

/// Converts a filesystem `mtime` (seconds since the Unix epoch, as read from
/// `Metadata::modified()`) into an `OffsetDateTime` for basename formatting
/// when no metadata date is available.
pub fn from_unix_seconds(seconds: f64) -> Result<OffsetDateTime> {
    let whole = seconds.trunc() as i64;
    let micros = ((seconds.fract()) * 1_000_000.0).round() as i64;
    let nanos = whole
        .checked_mul(1_000_000_000)
        .and_then(|v| v.checked_add(micros * 1_000))
        .ok_or_else(|| AppError::Time("mtime out of range".into()))?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(AppError::time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn basename_timestamp_formats_date_and_time() {
        let dt = datetime!(2013-12-14 08:49:00 UTC);
        let (formatted, micros) = basename_timestamp(dt).unwrap();
        assert_eq!(formatted, "20131214-084900");
        assert_eq!(micros, 0);
    }

    #[test]
    fn system_time_to_seconds_matches_unix_epoch_offset() {
        let time = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000);
        assert_eq!(system_time_to_seconds(time).unwrap(), 1_000.0);
    }

    #[test]
    fn from_unix_seconds_round_trips_through_basename() {
        let dt = datetime!(2013-12-14 08:49:00 UTC);
        let seconds = dt.unix_timestamp() as f64;
        let recovered = from_unix_seconds(seconds).unwrap();
        let (formatted, _) = basename_timestamp(recovered).unwrap();
        assert_eq!(formatted, "20131214-084900");
    }
}
