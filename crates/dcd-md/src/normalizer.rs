//! Deterministic price conversion into [`Micros`].
//!
//! Two entry points:
//! - [`parse_price`] for text sources (CSV). No floating point; more than six
//!   decimal places is rejected rather than rounded.
//! - [`micros_from_json`] for provider payloads, where prices arrive as JSON
//!   numbers and are rounded to the nearest micro.

use std::fmt;

use dcd_portfolio::{Micros, MICROS_SCALE};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizerError {
    EmptyPrice { field: &'static str },
    InvalidPrice { field: &'static str, raw: String },
    TooManyDecimalPlaces { field: &'static str, raw: String },
    NonPositivePrice { field: &'static str, raw: String },
}

impl fmt::Display for NormalizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizerError::EmptyPrice { field } => write!(f, "price field '{field}' is empty"),
            NormalizerError::InvalidPrice { field, raw } => {
                write!(f, "price field '{field}' could not be parsed: '{raw}'")
            }
            NormalizerError::TooManyDecimalPlaces { field, raw } => write!(
                f,
                "price field '{field}' has more than 6 decimal places: '{raw}'"
            ),
            NormalizerError::NonPositivePrice { field, raw } => {
                write!(f, "price field '{field}' must be > 0, got '{raw}'")
            }
        }
    }
}

impl std::error::Error for NormalizerError {}

/// Parse a signed decimal string into micros without floating point.
pub fn decimal_to_micros(s: &str, field: &'static str) -> Result<Micros, NormalizerError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormalizerError::EmptyPrice { field });
    }
    let invalid = || NormalizerError::InvalidPrice {
        field,
        raw: s.to_string(),
    };

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(invalid());
    }
    if frac_part.len() > 6 {
        return Err(NormalizerError::TooManyDecimalPlaces {
            field,
            raw: s.to_string(),
        });
    }

    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac_val: i64 = if frac_part.is_empty() {
        0
    } else {
        format!("{frac_part:0<6}").parse().map_err(|_| invalid())?
    };

    let raw = int_val
        .checked_mul(MICROS_SCALE)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(invalid)?;
    Ok(Micros::new(if negative { -raw } else { raw }))
}

/// [`decimal_to_micros`] that also requires a strictly positive result.
pub fn parse_price(s: &str, field: &'static str) -> Result<Micros, NormalizerError> {
    let px = decimal_to_micros(s, field)?;
    if !px.is_positive() {
        return Err(NormalizerError::NonPositivePrice {
            field,
            raw: s.trim().to_string(),
        });
    }
    Ok(px)
}

/// Positive price from a JSON number or numeric string.
pub fn micros_from_json(value: &Value, field: &'static str) -> Result<Micros, NormalizerError> {
    let px = match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(Micros::from_f64)
            .ok_or_else(|| NormalizerError::InvalidPrice {
                field,
                raw: n.to_string(),
            })?,
        Value::String(s) => return parse_price(s, field),
        Value::Null => return Err(NormalizerError::EmptyPrice { field }),
        other => {
            return Err(NormalizerError::InvalidPrice {
                field,
                raw: other.to_string(),
            })
        }
    };
    if !px.is_positive() {
        return Err(NormalizerError::NonPositivePrice {
            field,
            raw: value.to_string(),
        });
    }
    Ok(px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_decimals_exactly() {
        assert_eq!(parse_price("123.45", "close").unwrap(), Micros::new(123_450_000));
        assert_eq!(parse_price("0.000001", "close").unwrap(), Micros::new(1));
        assert_eq!(parse_price("+7", "close").unwrap(), Micros::from_units(7));
        assert_eq!(parse_price(".5", "close").unwrap(), Micros::new(500_000));
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!(
            parse_price("", "close"),
            Err(NormalizerError::EmptyPrice { field: "close" })
        );
        assert!(matches!(
            parse_price("1.2.3", "close"),
            Err(NormalizerError::InvalidPrice { .. })
        ));
        assert!(matches!(
            parse_price("1e3", "close"),
            Err(NormalizerError::InvalidPrice { .. })
        ));
        assert!(matches!(
            parse_price("1.1234567", "close"),
            Err(NormalizerError::TooManyDecimalPlaces { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_prices() {
        assert!(matches!(
            parse_price("0", "close"),
            Err(NormalizerError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            parse_price("-1.5", "close"),
            Err(NormalizerError::NonPositivePrice { .. })
        ));
        assert_eq!(decimal_to_micros("-1.5", "x").unwrap(), Micros::new(-1_500_000));
    }

    #[test]
    fn json_numbers_round_to_micros() {
        assert_eq!(
            micros_from_json(&json!(101.1234567), "adjusted_close").unwrap(),
            Micros::new(101_123_457)
        );
        assert_eq!(
            micros_from_json(&json!("12.5"), "adjusted_close").unwrap(),
            Micros::new(12_500_000)
        );
        assert!(micros_from_json(&json!(null), "adjusted_close").is_err());
        assert!(micros_from_json(&json!(0.0), "adjusted_close").is_err());
    }
}
