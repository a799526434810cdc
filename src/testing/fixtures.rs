//! Deterministic sample records and fixture files.
//!
//! Every record is built from its index alone, so two calls with the same count
//! return equal data. Text values never contain a delimiter or line break.

use crate::record::FakeName;
use crate::schema::{Schema, SchemaKind};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const GIVEN_NAMES: &[&str] = &["John", "Maria", "Wei", "Aisha", "Lukas", "Sofia", "Kenji", "Amara"];
const SURNAMES: &[&str] = &["Doe", "Garcia", "Zhang", "Khan", "Novak", "Rossi", "Sato", "Okafor"];
const CITIES: &[&str] = &["Springfield", "Riverton", "Lakeside", "Fairview", "Oakdale"];
const STREETS: &[&str] = &["Main St", "Elm Ave", "Hill Rd", "Park Ln", "Mill Way"];

fn base(i: usize) -> FakeName {
    let given = GIVEN_NAMES[i % GIVEN_NAMES.len()];
    let surname = SURNAMES[(i / 3) % SURNAMES.len()];
    let n = i as u32;
    FakeName {
        id: i32::try_from(i + 1).unwrap_or(i32::MAX),
        guid: Uuid::from_u128(0x7f1b_2d3c_0000_4000_8000_0000_0000_0000 + i as u128),
        gender: if i % 2 == 0 { "M" } else { "F" }.to_string(),
        given_name: given.to_string(),
        surname: surname.to_string(),
        birthday: NaiveDate::from_ymd_opt(1950 + (i % 50) as i32, 1 + n % 12, 1 + n % 28)
            .unwrap_or_default(),
        ..FakeName::default()
    }
}

fn domain(record: &FakeName) -> String {
    format!("{}.example", record.surname.to_lowercase())
}

fn email(record: &FakeName, i: usize) -> String {
    format!("{}{}@{}", record.given_name.to_lowercase(), i, domain(record))
}

/// `n` records for the `contacts` layout.
#[must_use]
pub fn sample_contacts(n: usize) -> Vec<FakeName> {
    (0..n)
        .map(|i| {
            let mut r = base(i);
            r.city = Some(CITIES[i % CITIES.len()].to_string());
            r.street_address = Some(format!("{} {}", 1 + i % 900, STREETS[i % STREETS.len()]));
            r.email_address = Some(email(&r, i));
            r.domain = Some(domain(&r));
            r
        })
        .collect()
}

/// `n` records for the `profiles` layout.
#[must_use]
pub fn sample_profiles(n: usize) -> Vec<FakeName> {
    (0..n)
        .map(|i| {
            let mut r = base(i);
            r.is_vip = Some(i % 3 == 0);
            r.height = Some(150 + (i % 50) as i32);
            r.weight = Some(50.0 + (i % 80) as f32 * 0.5);
            r.credit_card_number = Some(4_000_000_000_000_000 + i as i64);
            r
        })
        .collect()
}

/// `n` records for the `compact` layout.
#[must_use]
pub fn sample_compact(n: usize) -> Vec<FakeName> {
    (0..n)
        .map(|i| {
            let mut r = base(i);
            r.email_address = Some(email(&r, i));
            r.domain = Some(domain(&r));
            r
        })
        .collect()
}

/// `n` records for `kind`.
#[must_use]
pub fn sample_records(kind: SchemaKind, n: usize) -> Vec<FakeName> {
    match kind {
        SchemaKind::Contacts => sample_contacts(n),
        SchemaKind::Profiles => sample_profiles(n),
        SchemaKind::Compact => sample_compact(n),
    }
}

/// File bytes for `records` in the layout of `kind`: header, then one line per
/// record, every line terminated.
#[must_use]
pub fn render_file(kind: SchemaKind, records: &[FakeName]) -> Vec<u8> {
    let schema = kind.schema();
    let terminator = Schema::terminator(schema.line_ending);
    let mut out = String::new();
    out.push_str(schema.header());
    out.push_str(terminator);
    for record in records {
        out.push_str(&schema.render_line(record));
        out.push_str(terminator);
    }
    out.into_bytes()
}

/// Write [`render_file`] output to `dir/name`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_fixture(
    dir: impl AsRef<Path>,
    name: &str,
    kind: SchemaKind,
    records: &[FakeName],
) -> Result<PathBuf> {
    let path = dir.as_ref().join(name);
    std::fs::write(&path, render_file(kind, records))
        .with_context(|| format!("write fixture {}", path.display()))?;
    Ok(path)
}
