//! Publication ordering.
//!
//! Three orderings are supported: by citation key, by publication date
//! (newest first) and by first author. All of them are stable, so entries
//! with equal keys keep their order from the `.bib` file.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::record::Publication;

/// Canonical month abbreviations, in calendar order.
const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Errors that can occur while ordering publications.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SortError {
    #[error("Invalid sort option: {0} (expected one of: key, id, date, name)")]
    InvalidSortMode(String),

    #[error("Unknown month '{month}' in entry '{id}'")]
    UnknownMonth { id: String, month: String },

    #[error("Invalid year '{year}' in entry '{id}'")]
    InvalidYear { id: String, year: String },
}

/// How to order a publication list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum SortMode {
    /// Ascending by citation key (`key` or `id`)
    ById,
    /// Descending by year, then month (`date`)
    #[default]
    ByDate,
    /// Ascending by first author's last name, then first name (`name`)
    ByAuthor,
}

impl SortMode {
    /// Names accepted by [`SortMode::from_str`].
    pub const NAMES: &'static [&'static str] = &["key", "id", "date", "name"];
}

impl FromStr for SortMode {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "key" | "id" => Ok(SortMode::ById),
            "date" => Ok(SortMode::ByDate),
            "name" => Ok(SortMode::ByAuthor),
            other => Err(SortError::InvalidSortMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for SortMode {
    type Error = SortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortMode::ById => "key",
            SortMode::ByDate => "date",
            SortMode::ByAuthor => "name",
        };
        f.write_str(name)
    }
}

/// Parses `sort_type` and orders `entries` accordingly.
///
/// The sort mode is validated before any work is done.
///
/// # Errors
///
/// Returns [`SortError::InvalidSortMode`] for an unknown mode, and the
/// errors of [`sort_publications`] otherwise.
pub fn sort_entries(
    entries: Vec<Publication>,
    sort_type: &str,
) -> Result<Vec<Publication>, SortError> {
    let mode: SortMode = sort_type.parse()?;
    sort_publications(entries, mode)
}

/// Orders publications by the given mode.
///
/// # Errors
///
/// When sorting by date, a year that is not an integer or a month that is
/// not recognized aborts the sort. A missing year counts as 0 and a missing
/// month as January.
pub fn sort_publications(
    mut entries: Vec<Publication>,
    mode: SortMode,
) -> Result<Vec<Publication>, SortError> {
    match mode {
        SortMode::ById => {
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(entries)
        }
        SortMode::ByDate => {
            let mut keyed = entries
                .into_iter()
                .map(|entry| Ok((date_key(&entry)?, entry)))
                .collect::<Result<Vec<_>, SortError>>()?;
            keyed.sort_by_key(|(key, _)| Reverse(*key));
            Ok(keyed.into_iter().map(|(_, entry)| entry).collect())
        }
        SortMode::ByAuthor => {
            entries.sort_by(|a, b| author_key(a).cmp(&author_key(b)));
            Ok(entries)
        }
    }
}

fn date_key(entry: &Publication) -> Result<(i64, usize), SortError> {
    let year = match entry.get("year") {
        Some(year) => year
            .trim()
            .parse::<i64>()
            .map_err(|_| SortError::InvalidYear {
                id: entry.id.clone(),
                year: year.to_string(),
            })?,
        None => 0,
    };
    let month = match entry.get("month") {
        Some(month) => month_ord(month).ok_or_else(|| SortError::UnknownMonth {
            id: entry.id.clone(),
            month: month.to_string(),
        })?,
        None => 0,
    };
    Ok((year, month))
}

fn author_key(entry: &Publication) -> (&str, &str) {
    entry
        .first_author()
        .map(|a| (a.last.as_str(), a.first.as_str()))
        .unwrap_or(("", ""))
}

/// Returns the zero-based month number for a month name.
///
/// Names match on their first three letters, case-insensitively, so `jan`,
/// `Jan.` and `January` all give 0. Numbers 1 to 12 are accepted as well.
///
/// # Examples
///
/// ```
/// use publications::sort::month_ord;
///
/// assert_eq!(month_ord("March"), Some(2));
/// assert_eq!(month_ord("dec"), Some(11));
/// assert_eq!(month_ord("7"), Some(6));
/// assert_eq!(month_ord("Smarch"), None);
/// ```
pub fn month_ord(month_name: &str) -> Option<usize> {
    let trimmed = month_name.trim();
    if let Ok(number) = trimmed.parse::<usize>() {
        return (1..=12).contains(&number).then(|| number - 1);
    }
    let prefix: String = trimmed.chars().take(3).collect::<String>().to_lowercase();
    MONTHS.iter().position(|m| *m == prefix)
}
