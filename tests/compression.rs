//! Compressed inputs are detected and decoded transparently.

use anyhow::Result;
use linepipe::io::compression::codec_names;
use linepipe::testing::{assert_records_equal, render_file, sample_contacts};
use linepipe::{LinePipeline, ParseConfig, SchemaKind, parse_file};
use std::io::Write;
use std::path::Path;

fn write_with<W: Write>(mut encoder: W, data: &[u8]) -> Result<W> {
    encoder.write_all(data)?;
    Ok(encoder)
}

fn check(path: &Path) -> Result<()> {
    let out = parse_file(path, ParseConfig::default().with_pipe(256, 3))?;
    assert_records_equal(&out, &sample_contacts(200));
    Ok(())
}

#[test]
fn registry_lists_enabled_codecs() {
    let names = codec_names();
    #[cfg(feature = "compression-gzip")]
    assert!(names.contains(&"gzip".to_string()));
    #[cfg(feature = "compression-zstd")]
    assert!(names.contains(&"zstd".to_string()));
    let _ = names;
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_by_extension() -> Result<()> {
    use flate2::{Compression, write::GzEncoder};
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("people.csv.gz");
    let data = render_file(SchemaKind::Contacts, &sample_contacts(200));
    write_with(GzEncoder::new(std::fs::File::create(&path)?, Compression::default()), &data)?
        .finish()?;
    check(&path)
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_by_magic_bytes() -> Result<()> {
    use flate2::{Compression, write::GzEncoder};
    let data = render_file(SchemaKind::Contacts, &sample_contacts(200));
    let gz = write_with(GzEncoder::new(Vec::new(), Compression::fast()), &data)?.finish()?;

    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("people.bin");
    std::fs::write(&path, gz)?;
    check(&path)
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_by_extension() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("people.csv.zst");
    let data = render_file(SchemaKind::Contacts, &sample_contacts(200));
    let compressed = zstd::encode_all(&data[..], 3)?;
    std::fs::write(&path, compressed)?;
    check(&path)
}

#[cfg(feature = "compression-bzip2")]
#[test]
fn bzip2_by_extension() -> Result<()> {
    use bzip2::{Compression, write::BzEncoder};
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("people.csv.bz2");
    let data = render_file(SchemaKind::Contacts, &sample_contacts(200));
    write_with(BzEncoder::new(std::fs::File::create(&path)?, Compression::default()), &data)?
        .finish()?;
    check(&path)
}

#[cfg(feature = "compression-xz")]
#[test]
fn xz_by_extension() -> Result<()> {
    use xz2::write::XzEncoder;
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("people.csv.xz");
    let data = render_file(SchemaKind::Contacts, &sample_contacts(200));
    write_with(XzEncoder::new(std::fs::File::create(&path)?, 6), &data)?.finish()?;
    check(&path)
}

#[test]
fn plain_text_is_untouched() -> Result<()> {
    let data = render_file(SchemaKind::Contacts, &sample_contacts(200));
    let mut out = Vec::new();
    LinePipeline::from_reader(std::io::Cursor::new(data), ParseConfig::default())?.run(&mut out)?;
    assert_records_equal(&out, &sample_contacts(200));
    Ok(())
}
