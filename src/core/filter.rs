//! Filter records by date range and token count.
//!
//! This module provides [`FilterConfig`] for defining filter criteria and
//! [`apply_filters`] for filtering record collections. Filtering runs after
//! cleaning and before classification, so removed records never cost a
//! classifier call.
//!
//! # Filter Types
//!
//! | Filter | Method | Description |
//! |--------|--------|-------------|
//! | Date from | [`with_date_from`](FilterConfig::with_date_from) | Records on or after date |
//! | Date to | [`with_date_to`](FilterConfig::with_date_to) | Records on or before date |
//! | Min tokens | [`with_min_tokens`](FilterConfig::with_min_tokens) | Records with enough clean tokens |
//!
//! # Example
//!
//! ```
//! use chatmood::core::filter::FilterConfig;
//!
//! # fn main() -> chatmood::Result<()> {
//! let config = FilterConfig::new()
//!     .with_date_from("2022-01-01")?
//!     .with_date_to("2022-12-31")?
//!     .with_min_tokens(2);
//! assert!(config.is_active());
//! # Ok(())
//! # }
//! ```
//!
//! # Behavior Notes
//!
//! - Date bounds are inclusive whole days in the exporter's local time
//! - `min_tokens = 0` disables the token filter
//! - Multiple filters are combined with AND logic

use chrono::NaiveDate;

use crate::error::ChatmoodError;
use crate::message::EnrichedMessage;

/// Configuration for filtering records.
///
/// Filters are combined with AND logic: a record must match all active
/// filters to be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Keep only records on or after this day.
    pub after: Option<NaiveDate>,

    /// Keep only records on or before this day.
    pub before: Option<NaiveDate>,

    /// Keep only records with at least this many clean tokens.
    pub min_tokens: usize,
}

impl FilterConfig {
    /// Creates a new empty filter configuration.
    ///
    /// No filters are active by default; all records pass through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start date filter (inclusive). Date format: `YYYY-MM-DD`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatmoodError::InvalidDate`] if the format is invalid.
    pub fn with_date_from(mut self, date_str: &str) -> Result<Self, ChatmoodError> {
        self.after = Some(parse_date(date_str)?);
        Ok(self)
    }

    /// Sets the end date filter (inclusive). Date format: `YYYY-MM-DD`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatmoodError::InvalidDate`] if the format is invalid.
    pub fn with_date_to(mut self, date_str: &str) -> Result<Self, ChatmoodError> {
        self.before = Some(parse_date(date_str)?);
        Ok(self)
    }

    /// Sets the minimum number of clean tokens.
    #[must_use]
    pub fn with_min_tokens(mut self, min_tokens: usize) -> Self {
        self.min_tokens = min_tokens;
        self
    }

    /// Returns `true` if any filter is active.
    pub fn is_active(&self) -> bool {
        self.has_date_filter() || self.min_tokens > 0
    }

    /// Returns `true` if date filters are active.
    pub fn has_date_filter(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }

    /// Returns `true` if `record` passes every active filter.
    pub fn matches(&self, record: &EnrichedMessage) -> bool {
        let day = record.message.timestamp.date();
        if self.after.is_some_and(|after| day < after) {
            return false;
        }
        if self.before.is_some_and(|before| day > before) {
            return false;
        }
        record.token_count >= self.min_tokens
    }
}

/// Parse a date string in YYYY-MM-DD format.
fn parse_date(date_str: &str) -> Result<NaiveDate, ChatmoodError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| ChatmoodError::invalid_date(date_str))
}

/// Filters records, keeping their order.
///
/// If no filters are active, returns the records unchanged.
pub fn apply_filters(records: Vec<EnrichedMessage>, config: &FilterConfig) -> Vec<EnrichedMessage> {
    if !config.is_active() {
        return records;
    }

    records.into_iter().filter(|r| config.matches(r)).collect()
}
