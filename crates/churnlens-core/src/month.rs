//! Calendar-month windows used to partition reviews.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// `YYYY-MM` key identifying one month window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive `[start, end]` date range covering exactly one calendar month.
///
/// Windows are only constructible month-aligned, so consecutive windows
/// obtained through [`MonthWindow::previous`] / [`MonthWindow::next`] are
/// contiguous and never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl MonthWindow {
    /// The window of the month `date` falls in.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let start = date - Days::new(u64::from(date.day0()));
        let end = start + Months::new(1) - Days::new(1);
        Self { start, end }
    }

    /// Parse a `YYYY-MM` key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMonthKey`] if the key is not a valid month.
    pub fn from_key(key: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidMonthKey(key.to_string());
        if key.len() != 7 || key.as_bytes().get(4) != Some(&b'-') {
            return Err(invalid());
        }
        let first = NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d")
            .map_err(|_| invalid())?;
        Ok(Self::containing(first))
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn previous(&self) -> Self {
        Self::containing(self.start - Days::new(1))
    }

    #[must_use]
    pub fn next(&self) -> Self {
        Self::containing(self.end + Days::new(1))
    }

    #[must_use]
    pub fn key(&self) -> MonthKey {
        MonthKey(format!("{:04}-{:02}", self.start.year(), self.start.month()))
    }

    /// Date-inclusive on both ends; the time of day is ignored.
    #[must_use]
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.contains_date(at.date())
    }

    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}~{}", self.start, self.end)
    }
}
