//! External quit notification row.
//!
//! # Invariants
//! - Column order is fixed: `first_name, last_name, email, company, soft_deleted`.
//! - Records are transient and never persisted.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of columns every quit row must carry.
pub const QUIT_RECORD_COLUMNS: usize = 5;

/// One departing participant as declared by the external list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalQuitRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Employer display name.
    pub company: String,
    /// Informational flag from the source list; does not change processing.
    pub soft_deleted: bool,
}

impl ExternalQuitRecord {
    /// Builds a record from already-split fields in column order.
    ///
    /// Fields are trimmed. Exactly [`QUIT_RECORD_COLUMNS`] fields are required.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, QuitRecordError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().map(str::trim).collect();
        if fields.len() != QUIT_RECORD_COLUMNS {
            return Err(QuitRecordError::ColumnCount {
                expected: QUIT_RECORD_COLUMNS,
                actual: fields.len(),
            });
        }

        Ok(Self {
            first_name: fields[0].to_string(),
            last_name: fields[1].to_string(),
            email: fields[2].to_string(),
            company: fields[3].to_string(),
            soft_deleted: parse_flag(fields[4]),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "t" | "1" | "yes" | "y"
    )
}

/// Row-level problems that prevent building a quit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitRecordError {
    ColumnCount { expected: usize, actual: usize },
    /// Record could not be decoded by the tabular reader.
    Undecodable(String),
}

impl Display for QuitRecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnCount { expected, actual } => {
                write!(f, "expected {expected} columns, found {actual}")
            }
            Self::Undecodable(message) => write!(f, "undecodable row: {message}"),
        }
    }
}

impl Error for QuitRecordError {}
