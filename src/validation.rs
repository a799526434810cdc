//! Handling of malformed fields.
//!
//! Input files are machine generated and trusted, so the default
//! [`FieldPolicy::Lenient`] lets a field that fails to parse take its zero value
//! and keeps the record. The stricter policies reject such lines instead, either
//! dropping them ([`FieldPolicy::SkipInvalid`]) or aborting the run
//! ([`FieldPolicy::FailFast`]). Rejected lines are collected in an
//! [`ErrorCollector`] for reporting:
//!
//! ```
//! use linepipe::validation::{ErrorCollector, FieldError};
//!
//! let mut errors = ErrorCollector::with_limit(10);
//! errors.add(7, FieldError::new("Id", "not an integer", b"x1"));
//! assert_eq!(errors.error_count(), 1);
//! assert!(errors.to_json()?.contains("\"line\": 7"));
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// What happens to a line whose fields do not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Malformed fields take their zero value and the record is kept.
    #[default]
    Lenient,
    /// The line is dropped and reported.
    SkipInvalid,
    /// The run stops at the first malformed line.
    FailFast,
}

/// A field that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Column name
    pub field: String,
    /// What was wrong with it
    pub message: String,
    /// The raw field text, lossily decoded
    pub raw: String,
}

impl FieldError {
    pub fn new<S: Into<String>, M: Into<String>>(field: S, message: M, raw: &[u8]) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            raw: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if !self.raw.is_empty() {
            write!(f, " (got {:?})", self.raw)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// A rejected line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineError {
    /// 1-based line number in the input, header included
    pub line: u64,
    pub error: FieldError,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Collects rejected lines for batch reporting.
///
/// Only the first `limit` errors are kept; later ones are counted.
#[derive(Debug, Clone)]
pub struct ErrorCollector {
    errors: Vec<LineError>,
    limit: usize,
    dropped: u64,
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::with_limit(100)
    }
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            errors: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn add(&mut self, line: u64, error: FieldError) {
        if self.errors.len() < self.limit {
            self.errors.push(LineError { line, error });
        } else {
            self.dropped += 1;
        }
    }

    /// Total number of rejected lines, including ones not kept.
    pub fn error_count(&self) -> u64 {
        self.errors.len() as u64 + self.dropped
    }

    pub fn errors(&self) -> &[LineError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<LineError> {
        self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.error_count() == 0
    }

    /// Export the kept errors as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.errors).context("serialize line errors")
    }

    /// Write the kept errors to `path` as JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("write errors to {}", path.display()))
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCollector({} errors)", self.error_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_keeps_first_errors_and_counts_rest() {
        let mut c = ErrorCollector::with_limit(2);
        for line in 1..=5 {
            c.add(line, FieldError::new("Id", "not an integer", b"?"));
        }
        assert_eq!(c.errors().len(), 2);
        assert_eq!(c.error_count(), 5);
        assert_eq!(c.errors()[1].line, 2);
    }

    #[test]
    fn display_includes_raw_text() {
        let e = LineError {
            line: 3,
            error: FieldError::new("Birthday", "not a date", b"13/45/1990"),
        };
        assert_eq!(e.to_string(), "line 3: [Birthday] not a date (got \"13/45/1990\")");
    }

    #[test]
    fn writes_json_file() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("errors.json");
        let mut c = ErrorCollector::new();
        c.add(2, FieldError::new("Guid", "not a UUID", b"nope"));
        c.write_to_file(&path)?;
        let back: Vec<LineError> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(back, c.errors());
        Ok(())
    }
}
