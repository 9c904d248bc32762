use crate::contributions::errors::RecordError;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fmt;

/// A contribution amount, any sign or magnitude.
pub type Amount = f64;

/// Subkey written in place of a zip code or date that failed validation.
pub const INVALID: &str = "INVALID";

// positions of the consumed fields in a pipe-delimited record
pub const RECIPIENT_ID_FIELD: usize = 0;
pub const ZIP_FIELD: usize = 10;
pub const DATE_FIELD: usize = 13;
pub const AMOUNT_FIELD: usize = 14;
pub const OTHER_ID_FIELD: usize = 15;

const ZIP_LEN: usize = 5;
const DATE_LEN: usize = 8;
const DATE_FORMAT: &str = "%m%d%Y";

/// A grouping subkey (zip code or transaction date).
/// `Invalid` still accepts the record for aggregation but its grouping never emits it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Valid(String),
    Invalid,
}

impl GroupKey {
    pub fn is_valid(&self) -> bool {
        matches!(self, GroupKey::Valid(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            GroupKey::Valid(key) => key,
            GroupKey::Invalid => INVALID,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated contribution: the only shape of record the aggregation store accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub recipient_id: String,
    pub zip: GroupKey,
    pub date: GroupKey,
    pub amount: Amount,
}

/// Turns one raw record into a [`Contribution`].
/// rules, in order:
/// - fewer than 16 fields is malformed
/// - a non-empty other id, an empty amount or an empty recipient id is filtered
/// - zip is the first five characters trimmed, `INVALID` when shorter
/// - date must be a real MMDDYYYY date, otherwise `INVALID`
/// - an amount that does not parse as a finite number is malformed
pub fn validate(record: &StringRecord) -> Result<Contribution, RecordError> {
    let field = |index: usize| {
        record.get(index).ok_or_else(|| {
            RecordError::Malformed(format!(
                "expected at least {} fields, found {}",
                OTHER_ID_FIELD + 1,
                record.len()
            ))
        })
    };
    let other_id = field(OTHER_ID_FIELD)?.trim();
    let amount = field(AMOUNT_FIELD)?.trim();
    let recipient_id = field(RECIPIENT_ID_FIELD)?.trim();
    let zip_raw = field(ZIP_FIELD)?;
    let date_raw = field(DATE_FIELD)?.trim();

    if !other_id.is_empty() || amount.is_empty() || recipient_id.is_empty() {
        return Err(RecordError::Filtered(format!(
            "other_id: {:?}, amount: {:?}, recipient_id: {:?}",
            other_id, amount, recipient_id
        )));
    }

    Ok(Contribution {
        recipient_id: recipient_id.to_string(),
        zip: parse_zip(zip_raw),
        date: parse_date(date_raw),
        amount: parse_amount(amount)?,
    })
}

/// Only the first five characters of a zip code are significant.
pub fn parse_zip(raw: &str) -> GroupKey {
    let prefix: String = raw.chars().take(ZIP_LEN).collect();
    let zip = prefix.trim();
    if zip.chars().count() < ZIP_LEN {
        GroupKey::Invalid
    } else {
        GroupKey::Valid(zip.to_string())
    }
}

/// The raw MMDDYYYY string is kept as the key so that keys sort as text.
pub fn parse_date(raw: &str) -> GroupKey {
    let well_formed = raw.len() == DATE_LEN && raw.bytes().all(|b| b.is_ascii_digit());
    if well_formed && NaiveDate::parse_from_str(raw, DATE_FORMAT).is_ok() {
        GroupKey::Valid(raw.to_string())
    } else {
        GroupKey::Invalid
    }
}

pub fn parse_amount(value: &str) -> Result<Amount, RecordError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| {
            RecordError::Malformed(format!(
                "amount {:?} is not a finite decimal number",
                value
            ))
        })
}

/// Nearest integer, ties rounded away from zero, printed without a fraction.
/// Large magnitudes print every digit rather than switching to exponent notation.
pub fn format_rounded(amount: Amount) -> String {
    let rounded = amount.round();
    // -0.4 rounds to -0.0, which must print as 0
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.0}", rounded)
}
