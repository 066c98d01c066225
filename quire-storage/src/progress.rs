//! Progress sanitation for tracked books and reading sessions.
//!
//! Status transitions are unrestricted; every state is reachable from every
//! other. What this module guarantees is that the numbers handed to the
//! store are in range no matter what the user typed.

use quire_core::{BookId, QuireResult, ReadingStatus, TrackedBook, ValidationError};

use crate::mutation::Mutation;

/// Upper bound of a progress percentage.
pub const MAX_PERCENTAGE: u8 = 100;

/// Parse raw numeric input as a whole number.
///
/// Empty, non-numeric, NaN and infinite input count as zero. Fractions are
/// truncated toward zero. The result is not clamped.
pub fn parse_numeric_input(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    match trimmed.parse::<f64>() {
        // `as` saturates at the i64 bounds.
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

/// Clamp a percentage into [0, 100].
pub fn clamp_percentage(value: i64) -> u8 {
    value.clamp(0, i64::from(MAX_PERCENTAGE)) as u8
}

/// Clamp a page or hour count to be non-negative.
pub fn clamp_count(value: i64) -> u64 {
    value.max(0) as u64
}

/// Sanitize raw percentage input.
pub fn sanitize_percentage(raw: &str) -> u8 {
    clamp_percentage(parse_numeric_input(raw))
}

/// Sanitize raw pages-read or hours-spent input.
pub fn sanitize_count(raw: &str) -> u64 {
    clamp_count(parse_numeric_input(raw))
}

/// Parse status input. The enumeration is closed, so unknown text is a
/// validation failure.
pub fn parse_status(raw: &str) -> Result<ReadingStatus, ValidationError> {
    Ok(raw.parse::<ReadingStatus>()?)
}

/// Status a view may suggest for a percentage. Never enforced: status is
/// authoritative for "Finished".
pub fn suggested_status(percentage: u8) -> ReadingStatus {
    match percentage {
        0 => ReadingStatus::NotStarted,
        MAX_PERCENTAGE.. => ReadingStatus::Finished,
        _ => ReadingStatus::InProgress,
    }
}

/// A sanitized progress write for one tracked book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub book_id: BookId,
    pub status: ReadingStatus,
    pub percentage: u8,
}

impl ProgressUpdate {
    /// Build from raw status and percentage input.
    pub fn from_input(book_id: BookId, status: &str, percentage: &str) -> QuireResult<Self> {
        Ok(Self {
            book_id,
            status: parse_status(status)?,
            percentage: sanitize_percentage(percentage),
        })
    }

    /// Change the status of `book`, keeping its current percentage.
    pub fn with_status(book: &TrackedBook, status: ReadingStatus) -> Self {
        Self {
            book_id: book.id,
            status,
            percentage: clamp_percentage(i64::from(book.progress.percentage)),
        }
    }

    /// Change the percentage of `book` from raw input, keeping its status.
    pub fn with_percentage(book: &TrackedBook, percentage: &str) -> Self {
        Self {
            book_id: book.id,
            status: book.progress.status,
            percentage: sanitize_percentage(percentage),
        }
    }

    pub fn into_mutation(self) -> Mutation {
        Mutation::UpdateBookProgress {
            book_id: self.book_id,
            status: self.status,
            percentage: self.percentage,
        }
    }
}

/// A sanitized finish-session write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTotals {
    pub book_id: BookId,
    pub pages_read: u64,
    pub hours_spent: u64,
}

impl SessionTotals {
    pub fn from_input(book_id: BookId, pages_read: &str, hours_spent: &str) -> Self {
        Self {
            book_id,
            pages_read: sanitize_count(pages_read),
            hours_spent: sanitize_count(hours_spent),
        }
    }

    pub fn into_mutation(self) -> Mutation {
        Mutation::FinishReadingSession {
            book_id: self.book_id,
            pages_read: self.pages_read,
            hours_spent: self.hours_spent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::Progress;

    fn book(status: ReadingStatus, percentage: u8) -> TrackedBook {
        TrackedBook {
            id: BookId::new(3),
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            isbn: None,
            progress: Progress { status, percentage },
        }
    }

    #[test]
    fn test_percentage_clamped() {
        assert_eq!(sanitize_percentage("-5"), 0);
        assert_eq!(sanitize_percentage("150"), 100);
        assert_eq!(sanitize_percentage("abc"), 0);
        assert_eq!(sanitize_percentage(""), 0);
        assert_eq!(sanitize_percentage(" 42 "), 42);
        assert_eq!(sanitize_percentage("99.9"), 99);
        assert_eq!(sanitize_percentage("1e9"), 100);
    }

    #[test]
    fn test_non_finite_input_is_zero() {
        assert_eq!(parse_numeric_input("NaN"), 0);
        assert_eq!(parse_numeric_input("inf"), 0);
        assert_eq!(parse_numeric_input("-infinity"), 0);
    }

    #[test]
    fn test_counts_non_negative() {
        assert_eq!(sanitize_count("-10"), 0);
        assert_eq!(sanitize_count("40"), 40);
        assert_eq!(sanitize_count("2.7"), 2);
        assert_eq!(sanitize_count("pages"), 0);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(parse_status("Finished").unwrap(), ReadingStatus::Finished);
        assert_eq!(parse_status("in progress").unwrap(), ReadingStatus::InProgress);
        assert!(matches!(
            parse_status("Abandoned"),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_progress_update_from_input() {
        let update = ProgressUpdate::from_input(BookId::new(3), "Finished", "150").unwrap();
        assert_eq!(update.percentage, 100);
        assert_eq!(update.status, ReadingStatus::Finished);
        assert_eq!(
            update.into_mutation(),
            Mutation::UpdateBookProgress {
                book_id: BookId::new(3),
                status: ReadingStatus::Finished,
                percentage: 100,
            }
        );
    }

    #[test]
    fn test_edits_keep_the_other_field() {
        let current = book(ReadingStatus::InProgress, 30);
        let status_edit = ProgressUpdate::with_status(&current, ReadingStatus::NotStarted);
        assert_eq!(status_edit.percentage, 30);

        let pct_edit = ProgressUpdate::with_percentage(&current, "55");
        assert_eq!(pct_edit.status, ReadingStatus::InProgress);
        assert_eq!(pct_edit.percentage, 55);
    }

    #[test]
    fn test_any_transition_allowed() {
        for from in ReadingStatus::ALL {
            for to in ReadingStatus::ALL {
                let update = ProgressUpdate::with_status(&book(from, 10), to);
                assert_eq!(update.status, to);
            }
        }
    }

    #[test]
    fn test_suggested_status() {
        assert_eq!(suggested_status(0), ReadingStatus::NotStarted);
        assert_eq!(suggested_status(40), ReadingStatus::InProgress);
        assert_eq!(suggested_status(100), ReadingStatus::Finished);
    }

    #[test]
    fn test_session_totals() {
        let totals = SessionTotals::from_input(BookId::new(3), "40", "2");
        assert_eq!(totals.pages_read, 40);
        assert_eq!(totals.hours_spent, 2);
        let negative = SessionTotals::from_input(BookId::new(3), "-1", "x");
        assert_eq!((negative.pages_read, negative.hours_spent), (0, 0));
    }
}
