use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("{year} has no ISO week {week}")]
    WeekOutOfRange { year: i32, week: u32 },
}

/// Number of ISO weeks (52 or 53) in `year`.
pub fn weeks_in_year(year: i32) -> u32 {
    // Dec 28th always falls in the last ISO week of its year.
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|d| d.iso_week().week())
        .unwrap_or(52)
}

/// Identifies one weekly snippet: an ISO week-numbering year plus week.
///
/// Equality is structural, so two keys built independently from the same
/// `(year, week)` address the same cache slot and the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnippetKey {
    year: i32,
    week: u32,
}

impl SnippetKey {
    pub fn new(year: i32, week: u32) -> Result<Self, KeyError> {
        if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
            return Err(KeyError::WeekOutOfRange { year, week });
        }
        Ok(Self { year, week })
    }

    /// The ISO week that contains `date`.  Early-January dates can belong to
    /// the previous week-numbering year and late-December dates to the next.
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    pub fn year_key(&self) -> YearKey {
        YearKey(self.year)
    }

    pub fn next(&self) -> Self {
        if self.week < weeks_in_year(self.year) {
            Self {
                year: self.year,
                week: self.week + 1,
            }
        } else {
            Self {
                year: self.year + 1,
                week: 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.week > 1 {
            Self {
                year: self.year,
                week: self.week - 1,
            }
        } else {
            Self {
                year: self.year - 1,
                week: weeks_in_year(self.year - 1),
            }
        }
    }

    /// `2024-W03` style label, also the document id in storage.
    pub fn iso_label(&self) -> String {
        format!("{}-W{:02}", self.year, self.week)
    }

    /// Monday and Sunday of the week.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)?;
        let end = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Sun)?;
        Some((start, end))
    }
}

impl fmt::Display for SnippetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iso_label())
    }
}

/// Aggregate key: every snippet of one ISO week-numbering year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearKey(pub i32);

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The stored document shape.  An absent document and an empty `content`
/// are the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub year: i32,
    pub week: u32,
    pub content: String,
}

impl Snippet {
    pub fn new(key: SnippetKey, content: impl Into<String>) -> Self {
        Self {
            year: key.year,
            week: key.week,
            content: content.into(),
        }
    }

    pub fn empty(key: SnippetKey) -> Self {
        Self::new(key, String::new())
    }

    pub fn key(&self) -> Result<SnippetKey, KeyError> {
        SnippetKey::new(self.year, self.week)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
