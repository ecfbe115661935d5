//! EMVCo-style tag-length-value encoding.
//!
//! A field is a 2-digit tag, a 2-digit length and exactly that many characters
//! of value. Lengths count characters, not bytes. Only the top level is parsed;
//! template fields such as merchant account information keep their nested
//! encoding inside the value.

use std::fmt;
use thiserror::Error;

/// Largest value a 2-digit length prefix can describe.
pub const MAX_VALUE_LEN: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(u8);

impl Tag {
    pub const PAYLOAD_FORMAT: Tag = Tag(0);
    pub const TRANSACTION_AMOUNT: Tag = Tag(54);
    pub const CRC: Tag = Tag(63);

    /// Returns `None` for numbers that do not fit in two digits.
    pub const fn new(number: u8) -> Option<Self> {
        if number <= 99 { Some(Self(number)) } else { None }
    }

    pub const fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("field header truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("non-numeric tag at byte {offset}")]
    InvalidTag { offset: usize },
    #[error("non-numeric length at byte {offset}")]
    InvalidLength { offset: usize },
    #[error("tag {tag} declares {declared} characters but fewer remain at byte {offset}")]
    ValueTooShort {
        tag: Tag,
        declared: usize,
        offset: usize,
    },
    #[error("value for tag {tag} is {len} characters; at most 99 fit a length prefix")]
    ValueTooLong { tag: Tag, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    tag: Tag,
    value: String,
}

impl Field {
    pub fn new(tag: Tag, value: impl Into<String>) -> Result<Self, TlvError> {
        let value = value.into();
        let len = value.chars().count();
        if len > MAX_VALUE_LEN {
            return Err(TlvError::ValueTooLong { tag, len });
        }
        Ok(Self { tag, value })
    }

    /// A field holding the decimal form of `number`. A `u64` has at most 20
    /// digits, so the length prefix is always valid.
    pub fn numeric(tag: Tag, number: u64) -> Self {
        Self {
            tag,
            value: number.to_string(),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// True for a `63` field carrying four hex digits.
    pub fn is_checksum(&self) -> bool {
        self.tag == Tag::CRC && self.len() == 4 && self.value.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn encode_into(&self, out: &mut String) {
        use fmt::Write;
        // Writing into a String cannot fail.
        let _ = write!(out, "{}{:02}{}", self.tag, self.len(), self.value);
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}{}", self.tag, self.len(), self.value)
    }
}

/// Result of a parse that stops at the first malformed field instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lenient<'a> {
    pub fields: Vec<Field>,
    /// Unparsed input starting at the first malformed field. Empty when the
    /// whole input was well formed.
    pub remainder: &'a str,
    pub error: Option<TlvError>,
}

/// Parses the whole input, failing on the first malformed field.
pub fn parse(input: &str) -> Result<Vec<Field>, TlvError> {
    let parsed = parse_lenient(input);
    match parsed.error {
        Some(err) => Err(err),
        None => Ok(parsed.fields),
    }
}

pub fn parse_lenient(input: &str) -> Lenient<'_> {
    let mut fields = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        match next_field(rest, offset) {
            Ok((field, tail)) => {
                fields.push(field);
                rest = tail;
            }
            Err(error) => {
                return Lenient {
                    fields,
                    remainder: rest,
                    error: Some(error),
                };
            }
        }
    }
    Lenient {
        fields,
        remainder: "",
        error: None,
    }
}

pub fn serialize(fields: &[Field]) -> String {
    let mut out = String::new();
    for field in fields {
        field.encode_into(&mut out);
    }
    out
}

fn next_field(rest: &str, offset: usize) -> Result<(Field, &str), TlvError> {
    let header = rest.as_bytes();
    let (Some(tag_digits), Some(len_digits)) = (header.get(0..2), header.get(2..4)) else {
        return Err(TlvError::Truncated { offset });
    };
    let tag = two_digits(tag_digits)
        .and_then(Tag::new)
        .ok_or(TlvError::InvalidTag { offset })?;
    let declared = usize::from(two_digits(len_digits).ok_or(TlvError::InvalidLength {
        offset: offset + 2,
    })?);

    // The header is four ASCII digits, so byte 4 is a char boundary.
    let body = rest.get(4..).unwrap_or_default();
    let (value, tail) = split_at_chars(body, declared).ok_or(TlvError::ValueTooShort {
        tag,
        declared,
        offset: offset + 4,
    })?;
    Ok((
        Field {
            tag,
            value: value.to_owned(),
        },
        tail,
    ))
}

fn two_digits(bytes: &[u8]) -> Option<u8> {
    match bytes {
        [hi, lo] if hi.is_ascii_digit() && lo.is_ascii_digit() => {
            Some((hi - b'0') * 10 + (lo - b'0'))
        }
        _ => None,
    }
}

fn split_at_chars(s: &str, n: usize) -> Option<(&str, &str)> {
    match s.char_indices().nth(n) {
        Some((idx, _)) => Some(s.split_at(idx)),
        None if s.chars().count() == n => Some((s, "")),
        None => None,
    }
}
