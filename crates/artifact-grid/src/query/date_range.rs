//! Date directive parsing.
//!
//! ## Supported Syntax
//!
//! - `before:<date>` - captured on or before the date
//! - `after:<date>` - captured on or after the date
//! - `on:<date>`, `date:<date>` - captured on that day
//!
//! Dates are ISO: `YYYY-MM-DD`, or an RFC 3339 / `YYYY-MM-DDTHH:MM:SS`
//! timestamp whose calendar day is used.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::expression::DateRangeQuery;

/// Directive keywords understood by the date predicate.
pub const DATE_DIRECTIVES: [&str; 4] = ["before", "after", "on", "date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCondition {
    Before,
    After,
    On,
}

impl DateCondition {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            "on" | "date" => Some(Self::On),
            _ => None,
        }
    }

    /// Converts the condition into capture-date bounds.
    pub fn range(self, date: NaiveDate) -> DateRangeQuery {
        match self {
            Self::Before => DateRangeQuery {
                min_value: None,
                max_value: Some(date),
            },
            Self::After => DateRangeQuery {
                min_value: Some(date),
                max_value: None,
            },
            Self::On => DateRangeQuery {
                min_value: Some(date),
                max_value: Some(date),
            },
        }
    }
}

/// Parses a `keyword:date` token. Returns `None` for unknown keywords or
/// unparseable dates.
pub fn parse_date_directive(raw: &str) -> Option<(DateCondition, NaiveDate)> {
    let (keyword, value) = raw.split_once(':')?;
    let condition = DateCondition::from_keyword(keyword)?;
    let date = parse_iso_date(value)?;
    Some((condition, date))
}

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|timestamp| timestamp.date())
}
