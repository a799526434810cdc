//! Run configuration.
//!
//! [`ParseConfig`] bundles everything a [`LinePipeline`](crate::LinePipeline)
//! needs: which schema to decode, how lines end, how the header is recognised,
//! what to do with malformed fields, and how the byte source is sized. Every
//! field has a default, so a JSON file only needs the keys it changes:
//!
//! ```
//! use linepipe::config::ParseConfig;
//! use linepipe::schema::SchemaKind;
//!
//! let cfg = ParseConfig::from_json_str(r#"{ "schema": "profiles", "pipe": { "pool_capacity": 2 } }"#)?;
//! assert_eq!(cfg.schema, SchemaKind::Profiles);
//! assert_eq!(cfg.pipe.pool_capacity, 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::lines::{LineEnding, STACK_LINE_LIMIT};
use crate::schema::{HeaderMatch, SchemaKind};
use crate::validation::FieldPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sizing of the pipelined byte source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeOptions {
    /// Bytes per segment.
    pub segment_size: usize,
    /// Number of segments in the pool; bounds how far the filler runs ahead.
    pub pool_capacity: usize,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            segment_size: 64 * 1024,
            pool_capacity: 8,
        }
    }
}

/// Configuration of one parse run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Which built-in schema the file follows.
    pub schema: SchemaKind,
    /// Line terminator. `None` detects it from the first terminated line, falling
    /// back to the schema's default.
    pub line_ending: Option<LineEnding>,
    /// How header lines are recognised.
    pub header_match: HeaderMatch,
    /// What happens to lines with malformed fields.
    pub field_policy: FieldPolicy,
    /// Lines spanning segments and shorter than this are materialized on the
    /// stack; longer ones use a pooled heap buffer. Clamped to
    /// [`STACK_LINE_LIMIT`].
    pub stack_threshold: usize,
    /// Maximum number of rejected lines kept in the run summary.
    pub max_reported_errors: usize,
    pub pipe: PipeOptions,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            schema: SchemaKind::Contacts,
            line_ending: None,
            header_match: HeaderMatch::Exact,
            field_policy: FieldPolicy::Lenient,
            stack_threshold: STACK_LINE_LIMIT,
            max_reported_errors: 100,
            pipe: PipeOptions::default(),
        }
    }
}

impl ParseConfig {
    /// Default configuration for a schema.
    #[must_use]
    pub fn for_schema(schema: SchemaKind) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = Some(line_ending);
        self
    }

    #[must_use]
    pub fn with_header_match(mut self, header_match: HeaderMatch) -> Self {
        self.header_match = header_match;
        self
    }

    #[must_use]
    pub fn with_field_policy(mut self, field_policy: FieldPolicy) -> Self {
        self.field_policy = field_policy;
        self
    }

    #[must_use]
    pub fn with_stack_threshold(mut self, stack_threshold: usize) -> Self {
        self.stack_threshold = stack_threshold;
        self
    }

    #[must_use]
    pub fn with_pipe(mut self, segment_size: usize, pool_capacity: usize) -> Self {
        self.pipe = PipeOptions {
            segment_size,
            pool_capacity,
        };
        self
    }

    /// Parse a configuration from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or names an unknown variant.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse config JSON")
    }

    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() -> Result<()> {
        assert_eq!(ParseConfig::from_json_str("{}")?, ParseConfig::default());
        Ok(())
    }

    #[test]
    fn enums_use_snake_case() -> Result<()> {
        let cfg = ParseConfig::from_json_str(
            r#"{"schema":"compact","line_ending":"crlf","header_match":"contains","field_policy":"fail_fast"}"#,
        )?;
        assert_eq!(cfg.schema, SchemaKind::Compact);
        assert_eq!(cfg.line_ending, Some(LineEnding::CrLf));
        assert_eq!(cfg.header_match, HeaderMatch::Contains);
        assert_eq!(cfg.field_policy, FieldPolicy::FailFast);
        Ok(())
    }

    #[test]
    fn unknown_schema_is_rejected() {
        assert!(ParseConfig::from_json_str(r#"{"schema":"nope"}"#).is_err());
    }

    #[test]
    fn loads_from_file() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, r#"{"stack_threshold": 16}"#)?;
        let cfg = ParseConfig::from_json_file(&path)?;
        assert_eq!(cfg.stack_threshold, 16);
        Ok(())
    }
}
