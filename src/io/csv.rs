//! Export of decoded records.
//!
//! [`write_fake_names`] writes records back out in a schema's own layout: its
//! delimiter, terminator, column order and date format, with a header line first.
//! Fields are written verbatim, never quoted, which is what the parser expects;
//! a text value containing the delimiter therefore does not survive a round trip.
//!
//! ```no_run
//! use linepipe::config::ParseConfig;
//! use linepipe::io::csv::write_fake_names;
//! use linepipe::parse_file;
//! use linepipe::schema::SchemaKind;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = parse_file("people.csv", ParseConfig::default())?;
//! // Re-encode as the compact layout, zstd-compressed.
//! write_fake_names("out/people.compact.csv.zst", SchemaKind::Compact, &records)?;
//! # Ok(())
//! # }
//! ```

use crate::io::compression::auto_detect_writer;
use crate::lines::LineEnding;
use crate::record::FakeName;
use crate::schema::SchemaKind;
use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

/// Write `records` to `path` in the layout of `schema`.
///
/// Creates parent directories as needed and compresses by extension.
///
/// # Returns
/// The number of records written.
///
/// # Errors
/// Returns an error if the file or its directories cannot be created or a write
/// fails.
pub fn write_fake_names(
    path: impl AsRef<Path>,
    schema: SchemaKind,
    records: &[FakeName],
) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let w = auto_detect_writer(f, path)
        .with_context(|| format!("setup compression for {}", path.display()))?;
    write_fake_names_to(w, schema, records)
        .with_context(|| format!("write {}", path.display()))
}

/// Like [`write_fake_names`], into any writer.
///
/// # Errors
/// Returns an error if a write fails.
pub fn write_fake_names_to<W: Write>(
    writer: W,
    schema: SchemaKind,
    records: &[FakeName],
) -> Result<usize> {
    let schema = schema.schema();
    let terminator = match schema.line_ending {
        LineEnding::Lf => Terminator::Any(b'\n'),
        LineEnding::CrLf => Terminator::CRLF,
    };
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .flexible(false)
        .delimiter(schema.delimiter)
        .terminator(terminator)
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    wtr.write_record(schema.fields.iter().map(|f| f.name()))
        .context("write header")?;
    for (i, record) in records.iter().enumerate() {
        wtr.write_record(schema.render_fields(record))
            .with_context(|| format!("write record #{}", i + 1))?;
    }
    wtr.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_profiles;

    #[test]
    fn profiles_export_uses_crlf_and_iso_dates() -> Result<()> {
        let records = sample_profiles(1);
        let mut out = Vec::new();
        write_fake_names_to(&mut out, SchemaKind::Profiles, &records)?;
        let text = String::from_utf8(out)?;
        let mut lines = text.split("\r\n");
        assert_eq!(lines.next(), Some(SchemaKind::Profiles.schema().header()));
        let row = lines.next().unwrap_or_default();
        assert!(row.contains(&records[0].birthday.format("%Y-%m-%d").to_string()));
        assert!(text.ends_with("\r\n"));
        Ok(())
    }
}
