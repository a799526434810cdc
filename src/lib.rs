//! # linepipe
//!
//! A **pipelined line parser** for large, machine-generated delimited text files
//! with a fixed schema. Reading and parsing overlap: a filler thread reads the
//! file into pooled, fixed-size segments while the caller's thread finds lines
//! and decodes them into typed [`FakeName`] records, without copying bytes that
//! sit inside a single segment.
//!
//! ## Quick Start
//!
//! ```no_run
//! use linepipe::config::ParseConfig;
//! use linepipe::schema::SchemaKind;
//! use linepipe::parse_file;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let people = parse_file("people.csv", ParseConfig::for_schema(SchemaKind::Contacts))?;
//! println!("{} records", people.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## How it fits together
//!
//! - [`segment`]: a fixed pool of reusable byte segments. Ownership of a segment
//!   moves between the filler and the consumer; it is never shared.
//! - [`source`]: the [`PipeReader`] byte source. `read()` exposes every unread
//!   byte as a [`BufferedRange`] over one or more segments; `advance()` hands
//!   consumed segments back to the pool, which is what lets the filler run ahead.
//! - [`lines`]: finds complete lines in a buffered range. A line inside one
//!   segment is borrowed in place; a line crossing segments is copied to the
//!   stack when short and to a pooled heap buffer when long.
//! - [`decode`]: turns one line into a [`FakeName`] according to a [`schema`].
//! - [`driver`]: the [`LinePipeline`] loop, pushing records into a
//!   [`RecordSink`] or yielding them lazily.
//!
//! ## Schemas
//!
//! Three fixed layouts are built in, selected with [`SchemaKind`]:
//!
//! | kind       | delimiter | terminator | columns |
//! |------------|-----------|------------|---------|
//! | `contacts` | `;`       | `\n`       | Id, Guid, Gender, GivenName, Surname, City, StreetAddress, EmailAddress, Birthday, Domain |
//! | `profiles` | `,`       | `\r\n`     | Id, Guid, IsVip, Gender, GivenName, Surname, Birthday, Height, Weight, CreditCardNumber |
//! | `compact`  | `,`       | `\n`       | Id, Guid, Gender, GivenName, Surname, EmailAddress, Birthday, Domain |
//!
//! ## Malformed data
//!
//! Input is trusted by default: a field that does not parse takes its zero
//! value and the record is kept. [`FieldPolicy`] switches to skipping such
//! lines or failing on the first one. I/O errors always abort the run.
//!
//! ## Features
//!
//! - `io-csv`: record export ([`io::csv`])
//! - `parallel-io`: parse glob matches concurrently ([`io::glob::parse_glob`])
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz`: transparent decompression of inputs
//! - `metrics`: [`metrics::MetricsCollector`] integration
//!
//! All are on by default.

pub mod config;
pub mod decode;
pub mod driver;
pub mod io;
pub mod lines;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod record;
pub mod schema;
pub mod segment;
pub mod source;
pub mod testing;
pub mod validation;

pub use config::{ParseConfig, PipeOptions};
pub use decode::{Decoder, LineOutcome};
pub use driver::{LinePipeline, ParseSummary, RecordSink, Records, parse_file, sink_fn};
pub use lines::{LineEnding, LineReader, LineSpan, Materialization};
pub use record::FakeName;
pub use schema::{HeaderMatch, Schema, SchemaKind};
pub use segment::{Segment, SegmentPool, SlotId};
pub use source::{BufferedRange, Cursor, PipeReader, ReadResult};
pub use validation::{FieldError, FieldPolicy};

pub use io::glob::{expand_glob, expand_glob_required, parse_glob};

#[cfg(feature = "io-csv")]
pub use io::csv::write_fake_names;
