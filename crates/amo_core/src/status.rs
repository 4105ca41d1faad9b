use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of an uploaded file as the console stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Incomplete,
    AwaitingReview,
    Approved,
    Disabled,
    /// Terminal. Rendered as plain text, never as an editable control.
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown file status {0:?}")]
pub struct UnknownStatus(pub String);

impl FileStatus {
    pub const ALL: [FileStatus; 5] = [
        FileStatus::Incomplete,
        FileStatus::AwaitingReview,
        FileStatus::Approved,
        FileStatus::Disabled,
        FileStatus::Deleted,
    ];

    pub fn code(self) -> u8 {
        match self {
            FileStatus::Incomplete => 0,
            FileStatus::AwaitingReview => 3,
            FileStatus::Approved => 4,
            FileStatus::Disabled => 5,
            FileStatus::Deleted => 11,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|status| i64::from(status.code()) == code)
    }

    /// The value submitted in a status form field. The console has no form
    /// state for deleted files, so those go out as disabled.
    pub fn wire_code(self) -> u8 {
        match self {
            FileStatus::Deleted => FileStatus::Disabled.code(),
            other => other.code(),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == FileStatus::Deleted
    }

    pub fn name(self) -> &'static str {
        match self {
            FileStatus::Incomplete => "incomplete",
            FileStatus::AwaitingReview => "waiting",
            FileStatus::Approved => "approved",
            FileStatus::Disabled => "disabled",
            FileStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Accepts either the short name (`approved`) or the numeric code (`4`).
impl FromStr for FileStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| UnknownStatus(trimmed.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|status| status.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStatus(trimmed.to_string()))
    }
}
