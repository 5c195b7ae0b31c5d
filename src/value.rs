// ABOUTME: Dialect-neutral cell values and fetched row pages
// ABOUTME: Drivers decode into these types and encode from them on import

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use std::borrow::Cow;
use std::fmt;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATETIME_OFFSET_FORMATS: [&str; 2] =
    ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// A single cell as it travels from source to destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String representation used for length checks and text encoding.
    ///
    /// NULL renders as the empty string, blobs as lossy UTF-8.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(f.to_string()),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
            Value::Blob(b) => String::from_utf8_lossy(b),
        }
    }

    /// Length in characters of [`Value::as_text`].
    pub fn char_len(&self) -> usize {
        self.as_text().chars().count()
    }

    /// Convert a blob into text, leaving every other variant untouched.
    pub fn blob_to_string(self) -> Value {
        match self {
            Value::Blob(bytes) => match String::from_utf8(bytes) {
                Ok(s) => Value::Text(s),
                Err(e) => Value::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            },
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.as_text()),
        }
    }
}

/// One fetch result: a header plus rows positionally aligned to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPage {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowPage {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column in the header.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Timestamp text as UTC `YYYY-MM-DD HH:MM:SS[.fff]`, without an offset.
///
/// Accepts `+hh`, `+hhmm` and `+hh:mm` offsets or none at all. Trailing zero
/// fractions are dropped, so `.25` and `.250000` render alike. Returns `None`
/// for text that is not a timestamp.
pub fn utc_timestamp(text: &str) -> Option<String> {
    let naive = DATETIME_OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
        .map(|dt| dt.naive_utc())
        .or_else(|| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).ok())?;
    Some(naive.format(DATETIME_FORMAT).to_string())
}

/// Time-of-day text with its fraction normalized like [`utc_timestamp`].
pub fn canonical_time(text: &str) -> Option<String> {
    let time = NaiveTime::parse_from_str(text, TIME_FORMAT).ok()?;
    Some(time.format(TIME_FORMAT).to_string())
}
