//! How fresh the downloaded configuration is.

use chrono::{DateTime, Duration, Local, Utc};

const CURRENT_FOR_DAYS: i64 = 7;
const STALE_FOR_DAYS: i64 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// No download has ever succeeded.
    Never,
    /// Last success less than a week ago.
    Current(DateTime<Utc>),
    /// Last success more than a week ago.
    Stale(DateTime<Utc>),
    /// Last success more than a month ago.
    Outdated(DateTime<Utc>),
}

impl DownloadStatus {
    pub fn classify(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last_success else {
            return DownloadStatus::Never;
        };
        let age = now.signed_duration_since(last);
        if age < Duration::days(CURRENT_FOR_DAYS) {
            DownloadStatus::Current(last)
        } else if age < Duration::days(STALE_FOR_DAYS) {
            DownloadStatus::Stale(last)
        } else {
            DownloadStatus::Outdated(last)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DownloadStatus::Stale(_) | DownloadStatus::Outdated(_))
    }

    /// One-line description for the user.
    pub fn summary(&self) -> String {
        let fmt = |t: &DateTime<Utc>| t.with_timezone(&Local).format("%c").to_string();
        match self {
            DownloadStatus::Never => "Configuration has never been downloaded".to_string(),
            DownloadStatus::Current(t) => format!("Last configuration update: {}", fmt(t)),
            DownloadStatus::Stale(t) => format!(
                "Error: Last configuration update more than {} days ago: {}",
                CURRENT_FOR_DAYS,
                fmt(t)
            ),
            DownloadStatus::Outdated(t) => format!(
                "Error: Last configuration update more than {} days ago: {}",
                STALE_FOR_DAYS,
                fmt(t)
            ),
        }
    }
}
