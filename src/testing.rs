//! Testing utilities for parser users and for this crate's own tests.
//!
//! - **Fixtures**: deterministic sample records per schema and their file bytes
//! - **Mock I/O**: readers that control exactly where segment boundaries fall,
//!   or fail on demand
//! - **Assertions**: record comparisons with readable diagnostics
//!
//! ```
//! use linepipe::config::ParseConfig;
//! use linepipe::schema::SchemaKind;
//! use linepipe::testing::*;
//! use linepipe::LinePipeline;
//!
//! # fn main() -> anyhow::Result<()> {
//! let expected = sample_contacts(20);
//! let bytes = render_file(SchemaKind::Contacts, &expected);
//!
//! // One byte per read: every line crosses many segments.
//! let reader = ChunkedReader::uniform(bytes, 1);
//! let mut actual = Vec::new();
//! LinePipeline::from_reader(reader, ParseConfig::default())?.run(&mut actual)?;
//!
//! assert_records_equal(&actual, &expected);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_io;

pub use assertions::*;
pub use fixtures::*;
pub use mock_io::*;
