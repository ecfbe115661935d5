use super::crc::crc16_ccitt;
use super::tlv::{self, Field, Tag};
use crate::domain::money::Amount;
use crate::error::IntegrityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag `63` with its fixed length `04`; the checksum covers these four characters.
pub const CHECKSUM_PREFIX: &str = "6304";

/// A dynamic QRIS payload, ready to be encoded into a QR image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Payload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strips whitespace that configuration files tend to introduce.
pub fn normalize(template: &str) -> String {
    template.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Turns a static merchant template into a dynamic payload for `amount`.
///
/// Every top-level amount field (tag `54`) is removed, trailing checksum
/// fields (tag `63`) are dropped, a fresh amount field is appended and the
/// CRC is recomputed over the result. The function never fails: a malformed
/// template is parsed up to the first bad field and the rest is carried over,
/// minus any well-formed amount field found in it, which yields a payload
/// wallets will refuse. Use [`inspect_template`] and [`verify_payload`] when
/// that must be caught.
pub fn build_dynamic_payload(static_template: &str, amount: Amount) -> Payload {
    let normalized = normalize(static_template);
    let parsed = tlv::parse_lenient(&normalized);

    let mut fields: Vec<Field> = parsed
        .fields
        .into_iter()
        .filter(|field| field.tag() != Tag::TRANSACTION_AMOUNT)
        .collect();
    let scrubbed = strip_amount_fields(parsed.remainder);
    let remainder = strip_trailing_checksum_text(&scrubbed);
    if remainder.is_empty() {
        while fields.last().is_some_and(Field::is_checksum) {
            fields.pop();
        }
    }

    let mut out = tlv::serialize(&fields);
    out.push_str(remainder);
    Field::numeric(Tag::TRANSACTION_AMOUNT, amount.value()).encode_into(&mut out);
    out.push_str(CHECKSUM_PREFIX);
    let checksum = crc16_ccitt(&out);
    out.push_str(&checksum.to_string());
    Payload(out)
}

/// Strict check of a static template: non-empty and well-formed TLV.
pub fn inspect_template(static_template: &str) -> Result<Vec<Field>, IntegrityError> {
    let normalized = normalize(static_template);
    if normalized.is_empty() {
        return Err(IntegrityError::EmptyTemplate);
    }
    Ok(tlv::parse(&normalized)?)
}

/// A payload that passed [`verify_payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    pub fields: Vec<Field>,
    amount: String,
}

impl VerifiedPayload {
    /// Raw value of the transaction amount field.
    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// Checks the amount field against `expected`.
    pub fn ensure_amount(&self, expected: Amount) -> Result<(), IntegrityError> {
        let expected = expected.value().to_string();
        if self.amount == expected {
            Ok(())
        } else {
            Err(IntegrityError::AmountMismatch {
                expected,
                found: self.amount.clone(),
            })
        }
    }
}

/// Parses a dynamic payload and checks its checksum and amount field.
pub fn verify_payload(payload: &str) -> Result<VerifiedPayload, IntegrityError> {
    let fields = tlv::parse(payload)?;

    let found = match fields.last() {
        Some(field) if field.is_checksum() => field.value().to_owned(),
        _ => return Err(IntegrityError::MissingChecksum),
    };
    // The last four characters are ASCII hex digits, so this is a char boundary.
    let covered = payload
        .get(..payload.len() - 4)
        .ok_or(IntegrityError::MissingChecksum)?;
    let computed = crc16_ccitt(covered).to_string();
    if !computed.eq_ignore_ascii_case(&found) {
        return Err(IntegrityError::ChecksumMismatch { found, computed });
    }

    let mut amounts = fields
        .iter()
        .filter(|field| field.tag() == Tag::TRANSACTION_AMOUNT);
    let amount = match (amounts.next(), amounts.count()) {
        (Some(field), 0) => field.value().to_owned(),
        (None, _) => return Err(IntegrityError::AmountFieldCount(0)),
        (Some(_), extra) => return Err(IntegrityError::AmountFieldCount(extra + 1)),
    };

    Ok(VerifiedPayload { fields, amount })
}

/// Drops every `54LL<LL digits>` run from text the TLV parser could not
/// walk, resyncing one char at a time.
fn strip_amount_fields(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let skip = amount_field_len(rest).unwrap_or_else(|| {
            out.push(c);
            c.len_utf8()
        });
        rest = rest.get(skip..).unwrap_or_default();
    }
    out
}

/// Byte length of a well-formed amount field at the start of `text`.
fn amount_field_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let header = bytes.get(..4)?;
    if !header.starts_with(b"54") || !header[2..].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let len = usize::from(header[2] - b'0') * 10 + usize::from(header[3] - b'0');
    let value = bytes.get(4..4 + len)?;
    (len > 0 && value.iter().all(u8::is_ascii_digit)).then_some(4 + len)
}

fn strip_trailing_checksum_text(text: &str) -> &str {
    let Some(split) = text.len().checked_sub(8) else {
        return text;
    };
    match (text.get(..split), text.get(split..)) {
        (Some(head), Some(tail))
            if tail.starts_with(CHECKSUM_PREFIX)
                && tail.bytes().skip(4).all(|b| b.is_ascii_hexdigit()) =>
        {
            head
        }
        _ => text,
    }
}
