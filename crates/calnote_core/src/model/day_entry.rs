//! Day entry domain model.
//!
//! # Responsibility
//! - Define the canonical per-date annotation record.
//! - Provide partial-update merge semantics used by every entry write.
//!
//! # Invariants
//! - `date` is the unique key; at most one entry exists per calendar date.
//! - Unset tags are `None`; a blank tag never survives a merge.
//! - `time_from`/`time_to` are empty or `HH:MM`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage and display format of entry dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static TIME_OF_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

/// Free text plus structured annotations recorded for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEntry {
    pub date: NaiveDate,
    pub text: String,
    /// Short marker tag such as `◯` or `✕`.
    pub symbol: Option<String>,
    /// Stamp icon key chosen from the quick-input palette.
    pub stamp: Option<String>,
    /// `HH:MM` or empty.
    pub time_from: String,
    /// `HH:MM` or empty.
    pub time_to: String,
}

impl DayEntry {
    /// Creates an entry with every field unset.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            text: String::new(),
            symbol: None,
            stamp: None,
            time_from: String::new(),
            time_to: String::new(),
        }
    }

    /// Returns the ISO `YYYY-MM-DD` key of this entry.
    pub fn date_key(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Day of week with `0 = Sunday`, independent of the configured week start.
    pub fn weekday_index(&self) -> usize {
        self.date.weekday().num_days_from_sunday() as usize
    }

    /// Returns whether any field carries a non-default value.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
            || self.symbol.is_some()
            || self.stamp.is_some()
            || !self.time_from.is_empty()
            || !self.time_to.is_empty()
    }

    /// Returns a copy with `patch` applied on top of this entry.
    ///
    /// Fields absent from the patch keep their current value.
    pub fn merged(&self, patch: &EntryPatch) -> Self {
        Self {
            date: self.date,
            text: patch.text.clone().unwrap_or_else(|| self.text.clone()),
            symbol: match &patch.symbol {
                Some(value) => normalize_tag(value.as_deref()),
                None => self.symbol.clone(),
            },
            stamp: match &patch.stamp {
                Some(value) => normalize_tag(value.as_deref()),
                None => self.stamp.clone(),
            },
            time_from: patch
                .time_from
                .clone()
                .unwrap_or_else(|| self.time_from.clone()),
            time_to: patch.time_to.clone().unwrap_or_else(|| self.time_to.clone()),
        }
    }

    /// Validates field formats before persistence.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        validate_time_of_day("time_from", &self.time_from)?;
        validate_time_of_day("time_to", &self.time_to)?;
        Ok(())
    }
}

/// Partial update for one entry.
///
/// `None` keeps the existing value. For tags, `Some(None)` clears the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub text: Option<String>,
    pub symbol: Option<Option<String>>,
    pub stamp: Option<Option<String>>,
    pub time_from: Option<String>,
    pub time_to: Option<String>,
}

impl EntryPatch {
    /// Patch that only replaces the free text.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text: Some(value.into()),
            ..Self::default()
        }
    }

    /// Patch that replaces every field with the values of `entry`.
    ///
    /// Applying it makes the stored record equal to `entry` regardless of
    /// what was stored before.
    pub fn overwrite(entry: &DayEntry) -> Self {
        Self {
            text: Some(entry.text.clone()),
            symbol: Some(entry.symbol.clone()),
            stamp: Some(entry.stamp.clone()),
            time_from: Some(entry.time_from.clone()),
            time_to: Some(entry.time_to.clone()),
        }
    }
}

/// Entry validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValidationError {
    /// Date text is not a valid `YYYY-MM-DD` calendar date.
    InvalidDate(String),
    /// A time field is neither empty nor `HH:MM`.
    InvalidTimeOfDay { field: &'static str, value: String },
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate(value) => write!(f, "invalid entry date `{value}`"),
            Self::InvalidTimeOfDay { field, value } => {
                write!(f, "{field} must be empty or HH:MM, got `{value}`")
            }
        }
    }
}

impl Error for EntryValidationError {}

/// Parses an ISO `YYYY-MM-DD` entry key.
pub fn parse_entry_date(value: &str) -> Result<NaiveDate, EntryValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| EntryValidationError::InvalidDate(value.to_string()))
}

fn normalize_tag(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
}

fn validate_time_of_day(field: &'static str, value: &str) -> Result<(), EntryValidationError> {
    if value.is_empty() || TIME_OF_DAY_RE.is_match(value) {
        return Ok(());
    }
    Err(EntryValidationError::InvalidTimeOfDay {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_entry_date, DayEntry, EntryPatch, EntryValidationError};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn merge_keeps_fields_absent_from_patch() {
        let mut entry = DayEntry::empty(date(2024, 3, 4));
        entry.symbol = Some("◯".to_string());
        entry.time_from = "09:00".to_string();

        let merged = entry.merged(&EntryPatch::text("open"));
        assert_eq!(merged.text, "open");
        assert_eq!(merged.symbol.as_deref(), Some("◯"));
        assert_eq!(merged.time_from, "09:00");
    }

    #[test]
    fn merge_clears_tag_on_explicit_none_and_blank() {
        let mut entry = DayEntry::empty(date(2024, 3, 4));
        entry.symbol = Some("◯".to_string());
        entry.stamp = Some("coffee".to_string());

        let patch = EntryPatch {
            symbol: Some(None),
            stamp: Some(Some("   ".to_string())),
            ..EntryPatch::default()
        };
        let merged = entry.merged(&patch);
        assert_eq!(merged.symbol, None);
        assert_eq!(merged.stamp, None);
    }

    #[test]
    fn has_content_ignores_whitespace_text() {
        let mut entry = DayEntry::empty(date(2024, 3, 4));
        entry.text = "  \t".to_string();
        assert!(!entry.has_content());

        entry.time_to = "18:00".to_string();
        assert!(entry.has_content());
    }

    #[test]
    fn weekday_index_counts_from_sunday() {
        // 2024-03-03 is a Sunday, 2024-03-09 a Saturday.
        assert_eq!(DayEntry::empty(date(2024, 3, 3)).weekday_index(), 0);
        assert_eq!(DayEntry::empty(date(2024, 3, 9)).weekday_index(), 6);
    }

    #[test]
    fn validate_rejects_malformed_times() {
        let mut entry = DayEntry::empty(date(2024, 3, 4));
        entry.time_from = "24:00".to_string();
        assert!(matches!(
            entry.validate(),
            Err(EntryValidationError::InvalidTimeOfDay {
                field: "time_from",
                ..
            })
        ));

        entry.time_from = "23:59".to_string();
        entry.time_to = "9:00".to_string();
        assert!(entry.validate().is_err());

        entry.time_to = String::new();
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn parse_entry_date_rejects_impossible_dates() {
        assert_eq!(parse_entry_date("2024-02-29").unwrap(), date(2024, 2, 29));
        assert!(parse_entry_date("2023-02-29").is_err());
        assert!(parse_entry_date("2024/02/01").is_err());
    }

    #[test]
    fn overwrite_patch_reproduces_entry() {
        let mut source = DayEntry::empty(date(2024, 5, 6));
        source.text = "meeting".to_string();
        source.time_from = "10:00".to_string();

        let mut target = DayEntry::empty(date(2024, 5, 6));
        target.stamp = Some("star".to_string());
        target.time_to = "12:00".to_string();

        assert_eq!(target.merged(&EntryPatch::overwrite(&source)), source);
    }
}
