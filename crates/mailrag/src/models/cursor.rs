//! Sync cursor: the date boundary of the last fully successful pass

use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Calendar date with 1-indexed month and day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl SyncCursor {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Cursor for the current local date
    pub fn today() -> Self {
        Self::from(Local::now().date_naive())
    }

    /// Whether the fields fall inside the persisted-cursor bounds
    pub fn is_valid(&self) -> bool {
        self.year > 0 && (1..=12).contains(&self.month) && (1..=31).contains(&self.day)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::CacheCorrupt(format!("invalid date {}", self)))
        }
    }

    /// Provider search query selecting mail after this date
    pub fn search_query(&self) -> String {
        format!("after:{}", self)
    }

    /// Parse `YYYY-MM-DD` (as typed on the command line)
    pub fn parse_iso(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| Error::Config(format!("invalid date '{}': {}", s, e)))?;
        Ok(Self::from(date))
    }
}

impl From<NaiveDate> for SyncCursor {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Provider date format, no zero padding: `2025/1/7`
impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.month, self.day)
    }
}
