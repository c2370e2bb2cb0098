use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Timestamp format used everywhere in the store (UTC).
/// Lexicographic order matches chronological order, so SQL string
/// comparisons and ORDER BY work directly on these values.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

/// Get the configuration directory path.
/// If profile is Dev, uses "remind-dev" instead of "remind"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    let app_name = match profile {
        Profile::Dev => "remind-dev",
        Profile::Prod => "remind",
    };
    ProjectDirs::from("com", "remind", app_name).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path (database location).
/// If profile is Dev, uses "remind-dev" instead of "remind"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    let app_name = match profile {
        Profile::Dev => "remind-dev",
        Profile::Prod => "remind",
    };
    ProjectDirs::from("com", "remind", app_name).map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

/// Current UTC time in store format
pub fn now_string() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Format a UTC timestamp in store format
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a store-format timestamp back into a UTC datetime
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Parse a user-supplied due date.
///
/// Accepts `YYYY-MM-DD` (taken as midnight UTC) or `YYYY-MM-DD HH:MM`;
/// returns the timestamp in store format.
pub fn parse_due(input: &str) -> Result<String, String> {
    let input = input.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Ok(dt.and_utc().format(TIMESTAMP_FORMAT).to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("invalid date: {}", input))?;
        return Ok(midnight.and_utc().format(TIMESTAMP_FORMAT).to_string());
    }
    Err(format!(
        "invalid due date '{}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM",
        input
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn due_date_only_becomes_midnight() {
        let ts = parse_due("2025-03-12").unwrap();
        assert_eq!(ts, "2025-03-12 00:00:00");
    }

    #[test]
    fn due_date_with_time_keeps_minutes() {
        let ts = parse_due("2025-03-12 17:30").unwrap();
        assert_eq!(ts, "2025-03-12 17:30:00");
    }

    #[test]
    fn due_date_rejects_garbage() {
        assert!(parse_due("next tuesday").is_err());
        assert!(parse_due("2025-13-40").is_err());
        assert!(parse_due("").is_err());
    }

    #[test]
    fn timestamp_round_trip() {
        let now = now_string();
        let parsed = parse_timestamp(&now).unwrap();
        assert_eq!(format_timestamp(parsed), now);
        assert_eq!(parsed.nanosecond(), 0);
    }
}
