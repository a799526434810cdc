#![cfg(feature = "io-csv")]

use anyhow::Result;
use linepipe::io::csv::write_fake_names_to;
use linepipe::testing::{assert_records_equal, render_file, sample_records};
use linepipe::{ParseConfig, SchemaKind, parse_file, write_fake_names};

const KINDS: [SchemaKind; 3] = [SchemaKind::Contacts, SchemaKind::Profiles, SchemaKind::Compact];

#[test]
fn export_matches_fixture_layout() -> Result<()> {
    for kind in KINDS {
        let records = sample_records(kind, 20);
        let mut out = Vec::new();
        assert_eq!(write_fake_names_to(&mut out, kind, &records)?, 20);
        assert_eq!(out, render_file(kind, &records), "{kind:?}");
    }
    Ok(())
}

#[test]
fn exported_files_parse_back() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    for kind in KINDS {
        let records = sample_records(kind, 150);
        let path = tmp.path().join(format!("nested/{kind:?}.csv"));
        write_fake_names(&path, kind, &records)?;
        let parsed = parse_file(&path, ParseConfig::for_schema(kind).with_pipe(128, 2))?;
        assert_records_equal(&parsed, &records);
    }
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn compressed_export_parses_back() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let records = sample_records(SchemaKind::Contacts, 300);
    let path = tmp.path().join("contacts.csv.gz");
    write_fake_names(&path, SchemaKind::Contacts, &records)?;

    let raw = std::fs::read(&path)?;
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    assert_records_equal(&parse_file(&path, ParseConfig::default())?, &records);
    Ok(())
}

#[test]
fn empty_export_is_header_only() -> Result<()> {
    let mut out = Vec::new();
    write_fake_names_to(&mut out, SchemaKind::Profiles, &[])?;
    assert_eq!(out, format!("{}\r\n", SchemaKind::Profiles.schema().header()).into_bytes());
    Ok(())
}
