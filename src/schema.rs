//! Built-in record layouts.
//!
//! The parser understands three fixed layouts, all producing [`FakeName`]
//! records. A layout fixes the field delimiter, the default line terminator, the
//! accepted header spellings and the field order; none of it is configurable
//! beyond choosing a [`SchemaKind`].
//!
//! | kind       | delimiter | terminator | birthday     | trailing field     |
//! |------------|-----------|------------|--------------|--------------------|
//! | `contacts` | `;`       | `\n`       | `m/d/yyyy`   | domain             |
//! | `profiles` | `,`       | `\r\n`     | `yyyy-mm-dd` | credit card number |
//! | `compact`  | `,`       | `\n`       | `m/d/yyyy`   | domain             |
//!
//! `compact` is the comma-separated form of the eight-column export. Files of
//! the same columns written with `;` are not decoded by it; they split into a
//! single field under `,` and every later column is reported missing.

use crate::lines::LineEnding;
use crate::record::FakeName;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Selects one of the built-in layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Id, Guid, Gender, GivenName, Surname, City, StreetAddress, EmailAddress,
    /// Birthday, Domain.
    #[default]
    Contacts,
    /// Id, Guid, IsVip, Gender, GivenName, Surname, Birthday, Height, Weight,
    /// CreditCardNumber.
    Profiles,
    /// Id, Guid, Gender, GivenName, Surname, EmailAddress, Birthday, Domain.
    Compact,
}

impl SchemaKind {
    #[must_use]
    pub fn schema(self) -> &'static Schema {
        match self {
            Self::Contacts => &CONTACTS,
            Self::Profiles => &PROFILES,
            Self::Compact => &COMPACT,
        }
    }
}

/// How a line is recognised as the header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMatch {
    /// The whole line equals one of the accepted header spellings.
    #[default]
    Exact,
    /// The line contains one of the accepted header spellings.
    Contains,
}

/// Component order of the composite birthday field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DateOrder {
    /// `yyyy-mm-dd`
    YearMonthDay,
    /// `mm/dd/yyyy`
    MonthDayYear,
}

impl DateOrder {
    /// Separator between the three components.
    #[must_use]
    pub fn separator(self) -> u8 {
        match self {
            Self::YearMonthDay => b'-',
            Self::MonthDayYear => b'/',
        }
    }

    /// Arrange three parsed components as `(year, month, day)`.
    #[must_use]
    pub fn arrange(self, parts: [i32; 3]) -> (i32, i32, i32) {
        match self {
            Self::YearMonthDay => (parts[0], parts[1], parts[2]),
            Self::MonthDayYear => (parts[2], parts[0], parts[1]),
        }
    }

    #[must_use]
    pub fn format(self, date: NaiveDate) -> String {
        match self {
            Self::YearMonthDay => date.format("%Y-%m-%d").to_string(),
            Self::MonthDayYear => date.format("%m/%d/%Y").to_string(),
        }
    }
}

/// A column of a layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Guid,
    IsVip,
    Gender,
    GivenName,
    Surname,
    City,
    StreetAddress,
    EmailAddress,
    Birthday(DateOrder),
    Height,
    Weight,
    CreditCardNumber,
    Domain,
}

impl Field {
    /// Column name as it appears in the header.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Guid => "Guid",
            Self::IsVip => "IsVip",
            Self::Gender => "Gender",
            Self::GivenName => "GivenName",
            Self::Surname => "Surname",
            Self::City => "City",
            Self::StreetAddress => "StreetAddress",
            Self::EmailAddress => "EmailAddress",
            Self::Birthday(_) => "Birthday",
            Self::Height => "Height",
            Self::Weight => "Weight",
            Self::CreditCardNumber => "CreditCardNumber",
            Self::Domain => "Domain",
        }
    }

    /// Text form of this column's value in `record`. Absent optional values
    /// render as an empty string.
    #[must_use]
    pub fn render(self, record: &FakeName) -> String {
        fn opt<T: ToString>(v: Option<&T>) -> String {
            v.map(ToString::to_string).unwrap_or_default()
        }
        match self {
            Self::Id => record.id.to_string(),
            Self::Guid => record.guid.hyphenated().to_string(),
            Self::IsVip => match record.is_vip {
                Some(true) => "1".into(),
                Some(false) => "0".into(),
                None => String::new(),
            },
            Self::Gender => record.gender.clone(),
            Self::GivenName => record.given_name.clone(),
            Self::Surname => record.surname.clone(),
            Self::City => opt(record.city.as_ref()),
            Self::StreetAddress => opt(record.street_address.as_ref()),
            Self::EmailAddress => opt(record.email_address.as_ref()),
            Self::Birthday(order) => order.format(record.birthday),
            Self::Height => opt(record.height.as_ref()),
            Self::Weight => opt(record.weight.as_ref()),
            Self::CreditCardNumber => opt(record.credit_card_number.as_ref()),
            Self::Domain => opt(record.domain.as_ref()),
        }
    }
}

/// A fixed record layout.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub kind: SchemaKind,
    pub delimiter: u8,
    pub line_ending: LineEnding,
    /// Accepted header spellings; the first one is written on export.
    pub headers: &'static [&'static str],
    /// Columns in file order. The last one takes the rest of the line.
    pub fields: &'static [Field],
}

static CONTACTS: Schema = Schema {
    kind: SchemaKind::Contacts,
    delimiter: b';',
    line_ending: LineEnding::Lf,
    headers: &[
        "Id;Guid;Gender;GivenName;Surname;City;StreetAddress;EmailAddress;Birthday;Domain",
        "Id,Guid,Gender,GivenName,Surname,City,StreetAddress,EmailAddress,Birthday,Domain",
    ],
    fields: &[
        Field::Id,
        Field::Guid,
        Field::Gender,
        Field::GivenName,
        Field::Surname,
        Field::City,
        Field::StreetAddress,
        Field::EmailAddress,
        Field::Birthday(DateOrder::MonthDayYear),
        Field::Domain,
    ],
};

static PROFILES: Schema = Schema {
    kind: SchemaKind::Profiles,
    delimiter: b',',
    line_ending: LineEnding::CrLf,
    headers: &["Id,Guid,IsVip,Gender,GivenName,Surname,Birthday,Height,Weight,CreditCardNumber"],
    fields: &[
        Field::Id,
        Field::Guid,
        Field::IsVip,
        Field::Gender,
        Field::GivenName,
        Field::Surname,
        Field::Birthday(DateOrder::YearMonthDay),
        Field::Height,
        Field::Weight,
        Field::CreditCardNumber,
    ],
};

/// Comma-separated eight-column layout; the only accepted header is the
/// comma-joined column list.
static COMPACT: Schema = Schema {
    kind: SchemaKind::Compact,
    delimiter: b',',
    line_ending: LineEnding::Lf,
    headers: &["Id,Guid,Gender,GivenName,Surname,EmailAddress,Birthday,Domain"],
    fields: &[
        Field::Id,
        Field::Guid,
        Field::Gender,
        Field::GivenName,
        Field::Surname,
        Field::EmailAddress,
        Field::Birthday(DateOrder::MonthDayYear),
        Field::Domain,
    ],
};

impl Schema {
    /// Lower-case name of the layout.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            SchemaKind::Contacts => "contacts",
            SchemaKind::Profiles => "profiles",
            SchemaKind::Compact => "compact",
        }
    }

    /// The header written on export.
    #[must_use]
    pub fn header(&self) -> &'static str {
        self.headers[0]
    }

    /// Whether `line` is a header line under `mode`.
    #[must_use]
    pub fn is_header(&self, line: &[u8], mode: HeaderMatch) -> bool {
        match mode {
            HeaderMatch::Exact => self.headers.iter().any(|h| line == h.as_bytes()),
            HeaderMatch::Contains => self
                .headers
                .iter()
                .any(|h| memchr::memmem::find(line, h.as_bytes()).is_some()),
        }
    }

    /// Column values of `record`, in file order.
    #[must_use]
    pub fn render_fields(&self, record: &FakeName) -> Vec<String> {
        self.fields.iter().map(|f| f.render(record)).collect()
    }

    /// `record` as one line of this layout, without the terminator.
    #[must_use]
    pub fn render_line(&self, record: &FakeName) -> String {
        self.render_fields(record)
            .join(char::from(self.delimiter).encode_utf8(&mut [0; 4]))
    }

    /// The terminator bytes for `ending`.
    #[must_use]
    pub fn terminator(ending: LineEnding) -> &'static str {
        match ending {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}
