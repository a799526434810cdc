//! Line to record decoding.
//!
//! A [`Decoder`] turns the bytes of one line into a [`FakeName`]. It walks the
//! line left to right, slicing one field at a time at the schema's delimiter,
//! and hands each slice to a fixed-format parser from [`fields`]. Those parsers
//! work on the raw bytes and never allocate; only text columns produce owned
//! `String`s. The last column takes the rest of the line as-is.
//!
//! ```
//! use linepipe::decode::Decoder;
//! use linepipe::schema::SchemaKind;
//!
//! let decoder = Decoder::new(SchemaKind::Contacts.schema());
//! let line = b"1;7f1b2d3c-1111-2222-3333-444455556666;M;John;Doe;Springfield;1 Main St;j@doe.com;03/15/1990;doe.com";
//! let record = decoder.decode(line)?.expect("data line");
//! assert_eq!(record.id, 1);
//! assert_eq!(record.domain.as_deref(), Some("doe.com"));
//! # Ok::<(), linepipe::validation::FieldError>(())
//! ```

use crate::record::FakeName;
use crate::schema::{Field, HeaderMatch, Schema};
use crate::validation::{FieldError, FieldPolicy};

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// A data line. `defaulted` counts malformed fields that took their zero
    /// value; it is only ever non-zero under [`FieldPolicy::Lenient`].
    Record { record: FakeName, defaulted: u32 },
    Header,
    /// An empty line.
    Blank,
    /// A line the policy refuses to turn into a record.
    Rejected(FieldError),
}

/// Decodes lines of one schema.
///
/// The decoder holds no per-line state; decoding the same bytes twice yields
/// two equal, independent records.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    schema: &'static Schema,
    header_match: HeaderMatch,
    policy: FieldPolicy,
}

impl Decoder {
    #[must_use]
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            header_match: HeaderMatch::Exact,
            policy: FieldPolicy::Lenient,
        }
    }

    #[must_use]
    pub fn with_header_match(mut self, header_match: HeaderMatch) -> Self {
        self.header_match = header_match;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    #[must_use]
    pub fn policy(&self) -> FieldPolicy {
        self.policy
    }

    /// Decode `line`, returning `None` for the header and for empty lines.
    ///
    /// # Errors
    /// Returns the first malformed field when the policy is not lenient.
    pub fn decode(&self, line: &[u8]) -> Result<Option<FakeName>, FieldError> {
        match self.decode_line(line) {
            LineOutcome::Record { record, .. } => Ok(Some(record)),
            LineOutcome::Header | LineOutcome::Blank => Ok(None),
            LineOutcome::Rejected(e) => Err(e),
        }
    }

    /// Decode `line` with full detail about what happened.
    #[must_use]
    pub fn decode_line(&self, line: &[u8]) -> LineOutcome {
        if line.is_empty() {
            return LineOutcome::Blank;
        }
        if self.schema.is_header(line, self.header_match) {
            return LineOutcome::Header;
        }

        let mut record = FakeName::default();
        let mut defaulted = 0;
        let mut rest = Some(line);
        let last = self.schema.fields.len() - 1;

        for (i, &field) in self.schema.fields.iter().enumerate() {
            let raw = match rest {
                Some(bytes) if i == last => {
                    rest = None;
                    Some(bytes)
                }
                Some(bytes) => match memchr::memchr(self.schema.delimiter, bytes) {
                    Some(at) => {
                        rest = Some(&bytes[at + 1..]);
                        Some(&bytes[..at])
                    }
                    None => {
                        rest = None;
                        Some(bytes)
                    }
                },
                None => None,
            };

            if let Err(message) = assign(&mut record, field, raw) {
                match self.policy {
                    FieldPolicy::Lenient => defaulted += 1,
                    FieldPolicy::SkipInvalid | FieldPolicy::FailFast => {
                        return LineOutcome::Rejected(FieldError::new(
                            field.name(),
                            message,
                            raw.unwrap_or_default(),
                        ));
                    }
                }
            }
        }

        LineOutcome::Record { record, defaulted }
    }
}

/// Store one column into `record`. `None` means the line ended before the
/// column; the field keeps its default and the column counts as malformed.
fn assign(record: &mut FakeName, field: Field, raw: Option<&[u8]>) -> Result<(), &'static str> {
    let Some(raw) = raw else {
        match field {
            Field::City => record.city = Some(String::new()),
            Field::StreetAddress => record.street_address = Some(String::new()),
            Field::EmailAddress => record.email_address = Some(String::new()),
            Field::Domain => record.domain = Some(String::new()),
            _ => {}
        }
        return Err("missing field");
    };

    match field {
        Field::Id => {
            let v = fields::parse_i32(raw);
            record.id = v.unwrap_or_default();
            v.map(drop).ok_or("not an integer")
        }
        Field::Guid => {
            let v = fields::parse_uuid(raw);
            record.guid = v.unwrap_or_default();
            v.map(drop).ok_or("not a UUID")
        }
        Field::IsVip => {
            let v = fields::parse_bool(raw);
            record.is_vip = Some(v.unwrap_or_default());
            v.map(drop).ok_or("not a boolean")
        }
        Field::Gender => text(raw, &mut record.gender),
        Field::GivenName => text(raw, &mut record.given_name),
        Field::Surname => text(raw, &mut record.surname),
        Field::City => text(raw, record.city.get_or_insert_default()),
        Field::StreetAddress => text(raw, record.street_address.get_or_insert_default()),
        Field::EmailAddress => text(raw, record.email_address.get_or_insert_default()),
        Field::Domain => text(raw, record.domain.get_or_insert_default()),
        Field::Birthday(order) => {
            let v = fields::parse_date(raw, order.separator(), |parts| order.arrange(parts));
            record.birthday = v.unwrap_or_default();
            v.map(drop).ok_or("not a date")
        }
        Field::Height => {
            let v = fields::parse_i32(raw);
            record.height = Some(v.unwrap_or_default());
            v.map(drop).ok_or("not an integer")
        }
        Field::Weight => {
            let v = fields::parse_f32(raw);
            record.weight = Some(v.unwrap_or_default());
            v.map(drop).ok_or("not a number")
        }
        Field::CreditCardNumber => {
            let v = fields::parse_i64(raw);
            record.credit_card_number = Some(v.unwrap_or_default());
            v.map(drop).ok_or("not an integer")
        }
    }
}

fn text(raw: &[u8], out: &mut String) -> Result<(), &'static str> {
    match std::str::from_utf8(raw) {
        Ok(s) => {
            out.push_str(s);
            Ok(())
        }
        Err(_) => {
            out.push_str(&String::from_utf8_lossy(raw));
            Err("invalid UTF-8")
        }
    }
}

/// Fixed-format field parsers.
///
/// They accept exactly the forms the generator writes: optional leading `-` or
/// `+`, ASCII digits, no surrounding whitespace. Anything else is `None`.
pub mod fields {
    use chrono::NaiveDate;
    use uuid::Uuid;

    pub fn parse_i64(bytes: &[u8]) -> Option<i64> {
        let (negative, digits) = match bytes.split_first()? {
            (b'-', rest) => (true, rest),
            (b'+', rest) => (false, rest),
            _ => (false, bytes),
        };
        if digits.is_empty() {
            return None;
        }
        let mut acc: i64 = 0;
        for &b in digits {
            if !b.is_ascii_digit() {
                return None;
            }
            let d = i64::from(b - b'0');
            acc = acc.checked_mul(10)?;
            // Accumulate negatives downwards so i64::MIN stays representable.
            acc = if negative {
                acc.checked_sub(d)?
            } else {
                acc.checked_add(d)?
            };
        }
        Some(acc)
    }

    pub fn parse_i32(bytes: &[u8]) -> Option<i32> {
        parse_i64(bytes).and_then(|v| i32::try_from(v).ok())
    }

    pub fn parse_f32(bytes: &[u8]) -> Option<f32> {
        std::str::from_utf8(bytes).ok()?.parse().ok()
    }

    /// `0`/`1` (any integer, non-zero is true) or `true`/`false`.
    pub fn parse_bool(bytes: &[u8]) -> Option<bool> {
        if bytes.eq_ignore_ascii_case(b"true") {
            return Some(true);
        }
        if bytes.eq_ignore_ascii_case(b"false") {
            return Some(false);
        }
        parse_i64(bytes).map(|v| v != 0)
    }

    /// Hyphenated or simple UUID text.
    pub fn parse_uuid(bytes: &[u8]) -> Option<Uuid> {
        Uuid::try_parse_ascii(bytes).ok()
    }

    /// Three integers separated by `sep`, arranged into `(year, month, day)` by
    /// `arrange`.
    pub fn parse_date(
        bytes: &[u8],
        sep: u8,
        arrange: impl FnOnce([i32; 3]) -> (i32, i32, i32),
    ) -> Option<NaiveDate> {
        let mut parts = bytes.splitn(3, |&b| b == sep);
        let a = parse_i32(parts.next()?)?;
        let b = parse_i32(parts.next()?)?;
        let c = parse_i32(parts.next()?)?;
        let (year, month, day) = arrange([a, b, c]);
        NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
    }
}
