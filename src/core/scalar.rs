//! Purpose: Per-type parsing and validation of raw scalar input.
//! Exports: `parse_scalar`, `ScalarError`, `ValueErrorKind`.
//! Role: Pure functions invoked by the extractor on every enabled leaf.
//! Invariants: 32-bit types are range-checked on the converted number.
//! Invariants: 64-bit types are range-checked lexically and returned as exact
//!             text, never as a binary float, so precision survives JSON.

use crate::core::descriptor::FieldType;
use crate::core::node::Slot;
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt;

const INT32_MIN: i128 = -2_147_483_648;
const INT32_MAX: i128 = 2_147_483_647;
const UINT32_MAX: i128 = 4_294_967_295;
const FLOAT_MAX: f64 = 3.402_823_466_385_288_6e38;

const INT64_MIN_TEXT: &str = "-9223372036854775808";
const INT64_MAX_TEXT: &str = "9223372036854775807";
const INT64_MAX_HEX: &str = "0x7fffffffffffffff";
const UINT64_MAX_TEXT: &str = "18446744073709551615";
const UINT64_MAX_HEX: &str = "0xffffffffffffffff";
// `0x` plus sixteen hex digits.
const HEX64_MAX_LEN: usize = 18;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueErrorKind {
    EmptyValue,
    InvalidFormat,
    OutOfRange,
    NotSelected,
}

impl fmt::Display for ValueErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            ValueErrorKind::EmptyValue => "is empty",
            ValueErrorKind::InvalidFormat => "is invalid",
            ValueErrorKind::OutOfRange => "is out of range",
            ValueErrorKind::NotSelected => "is not selected",
        };
        f.write_str(phrase)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScalarError {
    pub kind: ValueErrorKind,
    pub detail: String,
}

impl ScalarError {
    fn new(kind: ValueErrorKind) -> Self {
        Self {
            kind,
            detail: kind.to_string(),
        }
    }

    fn with_detail(kind: ValueErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Parse one enabled leaf according to its field type.
///
/// MESSAGE fields have no scalar parser; extraction recurses into their
/// sub-tree instead of calling this.
pub fn parse_scalar(field_type: FieldType, slot: &Slot) -> Result<Value, ScalarError> {
    match field_type {
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => {
            parse_integer32(slot_text(slot)?, true, INT32_MIN, INT32_MAX)
        }
        FieldType::Uint32 | FieldType::Fixed32 => {
            parse_integer32(slot_text(slot)?, false, 0, UINT32_MAX)
        }
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => parse_integer64(
            slot_text(slot)?,
            true,
            INT64_MAX_TEXT,
            INT64_MAX_HEX,
            Some(INT64_MIN_TEXT),
        ),
        FieldType::Uint64 | FieldType::Fixed64 => {
            parse_integer64(slot_text(slot)?, false, UINT64_MAX_TEXT, UINT64_MAX_HEX, None)
        }
        FieldType::Double => {
            let number = parse_finite(slot_text(slot)?)?;
            to_number_value(number)
        }
        FieldType::Float => {
            let number = parse_finite(slot_text(slot)?)?;
            if !(-FLOAT_MAX..=FLOAT_MAX).contains(&number) {
                return Err(ScalarError::new(ValueErrorKind::OutOfRange));
            }
            to_number_value(number)
        }
        FieldType::Bool => match slot {
            Slot::Checked(checked) => Ok(Value::Bool(*checked)),
            _ => Err(slot_mismatch("a checked state")),
        },
        FieldType::Enum => match slot {
            Slot::Selected(Some(number)) => Ok(Value::Number(Number::from(*number))),
            Slot::Selected(None) => Err(ScalarError::new(ValueErrorKind::NotSelected)),
            _ => Err(slot_mismatch("a selection")),
        },
        // Pass-through; percent-encoding of non-ASCII bytes is the caller's job.
        FieldType::String | FieldType::Bytes => Ok(Value::String(slot_text(slot)?.to_string())),
        FieldType::Message => Err(ScalarError::with_detail(
            ValueErrorKind::InvalidFormat,
            "message fields are extracted recursively, not parsed",
        )),
    }
}

fn slot_text(slot: &Slot) -> Result<&str, ScalarError> {
    match slot {
        Slot::Text(text) => Ok(text),
        _ => Err(slot_mismatch("text")),
    }
}

fn slot_mismatch(wanted: &str) -> ScalarError {
    ScalarError::with_detail(
        ValueErrorKind::InvalidFormat,
        format!("input slot does not hold {wanted}"),
    )
}

/// Decimal or `0x`-hex integer lexeme, after trimming and lowercasing.
/// The sign is only part of the decimal form; hex is always non-negative.
fn is_integer_lexeme(text: &str, signed: bool) -> bool {
    if let Some(hex) = text.strip_prefix("0x") {
        return !hex.is_empty() && hex.bytes().all(|byte| byte.is_ascii_hexdigit());
    }
    let digits = if signed {
        text.strip_prefix('-').unwrap_or(text)
    } else {
        text
    };
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

fn normalized(raw: &str) -> Result<String, ScalarError> {
    let text = raw.trim().to_ascii_lowercase();
    if text.is_empty() {
        return Err(ScalarError::new(ValueErrorKind::EmptyValue));
    }
    Ok(text)
}

fn parse_integer32(raw: &str, signed: bool, min: i128, max: i128) -> Result<Value, ScalarError> {
    let text = normalized(raw)?;
    if !is_integer_lexeme(&text, signed) {
        return Err(ScalarError::new(ValueErrorKind::InvalidFormat));
    }

    // Conversion overflow means the text was lexically fine but the value is
    // too large, which is a range failure, not a format failure.
    let value: i128 = if let Some(hex) = text.strip_prefix("0x") {
        match u128::from_str_radix(hex, 16) {
            Ok(value) if value <= i128::MAX as u128 => value as i128,
            _ => return Err(ScalarError::new(ValueErrorKind::OutOfRange)),
        }
    } else {
        match text.parse::<i128>() {
            Ok(value) => value,
            Err(_) => return Err(ScalarError::new(ValueErrorKind::OutOfRange)),
        }
    };

    if value < min || value > max {
        return Err(ScalarError::new(ValueErrorKind::OutOfRange));
    }
    Ok(Value::Number(Number::from(value as i64)))
}

/// 64-bit integers keep their exact decimal/hex text. The range check is
/// lexical: sign first, then digit length, then bytewise order against the
/// boundary constant.
fn parse_integer64(
    raw: &str,
    signed: bool,
    max_text: &str,
    max_hex: &str,
    min_text: Option<&str>,
) -> Result<Value, ScalarError> {
    let text = normalized(raw)?;
    if !is_integer_lexeme(&text, signed) {
        return Err(ScalarError::new(ValueErrorKind::InvalidFormat));
    }

    let out_of_range = if text.starts_with('-') {
        let min = min_text.unwrap_or(max_text);
        text.len() > min.len() || (text.len() == min.len() && text.as_str() > min)
    } else if text.starts_with("0x") {
        text.len() > HEX64_MAX_LEN || (text.len() == HEX64_MAX_LEN && text.as_str() > max_hex)
    } else {
        text.len() > max_text.len() || (text.len() == max_text.len() && text.as_str() > max_text)
    };

    if out_of_range {
        return Err(ScalarError::new(ValueErrorKind::OutOfRange));
    }
    Ok(Value::String(text))
}

fn parse_finite(raw: &str) -> Result<f64, ScalarError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ScalarError::new(ValueErrorKind::EmptyValue));
    }
    let number: f64 = text
        .parse()
        .map_err(|_| ScalarError::new(ValueErrorKind::InvalidFormat))?;
    if !number.is_finite() {
        return Err(ScalarError::new(ValueErrorKind::OutOfRange));
    }
    Ok(number)
}

fn to_number_value(number: f64) -> Result<Value, ScalarError> {
    Number::from_f64(number)
        .map(Value::Number)
        .ok_or_else(|| ScalarError::new(ValueErrorKind::OutOfRange))
}
