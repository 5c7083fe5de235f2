//! Time helpers for the database layer.
//!
//! Timestamps are stored as `INTEGER` Unix epoch milliseconds (UTC). Daily
//! usage resets are keyed by a `YYYY-MM-DD` calendar date whose timezone is
//! chosen by [`UsageResetPolicy`].

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Format of the stored reset date.
pub const RESET_DATE_FORMAT: &str = "%Y-%m-%d";

/// Current time as Unix epoch milliseconds (UTC).
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which clock decides where one usage day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageResetPolicy {
    #[default]
    Utc,
    /// The server's local timezone.
    Local,
}

impl UsageResetPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "utc" => Some(Self::Utc),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    /// Today's calendar date under this policy.
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::Utc => Utc::now().date_naive(),
            Self::Local => Local::now().date_naive(),
        }
    }

    /// Today's date in the stored string format.
    pub fn today_string(&self) -> String {
        self.today().format(RESET_DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!(UsageResetPolicy::parse("UTC"), Some(UsageResetPolicy::Utc));
        assert_eq!(UsageResetPolicy::parse("local"), Some(UsageResetPolicy::Local));
        assert_eq!(UsageResetPolicy::parse("mars"), None);
    }

    #[test]
    fn test_today_string_format() {
        let today = UsageResetPolicy::Utc.today_string();
        assert!(NaiveDate::parse_from_str(&today, RESET_DATE_FORMAT).is_ok());
        assert_eq!(today.len(), 10);
    }
}
