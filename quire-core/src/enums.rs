//! Enum types for Quire entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reading status of a tracked book.
///
/// A flat enumeration: every status is reachable from every other one. The
/// store receives the wire strings returned by [`ReadingStatus::as_wire_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReadingStatus {
    #[default]
    NotStarted,
    InProgress,
    Finished,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [
        ReadingStatus::NotStarted,
        ReadingStatus::InProgress,
        ReadingStatus::Finished,
    ];

    /// Convert to the store's string representation.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ReadingStatus::NotStarted => "Not started",
            ReadingStatus::InProgress => "In progress",
            ReadingStatus::Finished => "Finished",
        }
    }

    /// Parse from the store's string representation or the variant name.
    pub fn from_wire_str(s: &str) -> Result<Self, ReadingStatusParseError> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "notstarted" => Ok(ReadingStatus::NotStarted),
            "inprogress" => Ok(ReadingStatus::InProgress),
            "finished" => Ok(ReadingStatus::Finished),
            _ => Err(ReadingStatusParseError(s.to_string())),
        }
    }

    /// Whether this status carries "book completed" semantics.
    pub fn is_finished(&self) -> bool {
        matches!(self, ReadingStatus::Finished)
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = ReadingStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

impl TryFrom<String> for ReadingStatus {
    type Error = ReadingStatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_wire_str(&value)
    }
}

impl From<ReadingStatus> for String {
    fn from(status: ReadingStatus) -> Self {
        status.as_wire_str().to_string()
    }
}

/// Error when parsing an invalid reading status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingStatusParseError(pub String);

impl fmt::Display for ReadingStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid reading status: {}", self.0)
    }
}

impl std::error::Error for ReadingStatusParseError {}
