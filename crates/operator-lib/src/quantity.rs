//! Kubernetes resource quantity parsing
//!
//! Only the integer value of a quantity is needed here (bytes for memory),
//! rounded up like the apiserver's `Quantity.Value()`.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const MIB: i128 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity number in '{0}'")]
    InvalidNumber(String),

    #[error("unknown quantity suffix '{suffix}' in '{input}'")]
    UnknownSuffix { input: String, suffix: String },

    #[error("quantity '{0}' is out of range")]
    Overflow(String),
}

/// Integer value of a quantity, rounded up
pub fn value(quantity: &Quantity) -> Result<i64, QuantityError> {
    parse_value(&quantity.0)
}

/// Whole MiB contained in a quantity (integer division of the byte value)
pub fn mebibytes(quantity: &Quantity) -> Result<i64, QuantityError> {
    let bytes = i128::from(value(quantity)?);
    i64::try_from(bytes / MIB).map_err(|_| QuantityError::Overflow(quantity.0.clone()))
}

fn parse_value(input: &str) -> Result<i64, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    let (negative, unsigned) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let number_len = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);

    let (mantissa, scale) = parse_decimal(number).ok_or_else(|| QuantityError::InvalidNumber(s.to_string()))?;
    let (numerator, denominator) = multiplier(s, suffix)?;

    let overflow = || QuantityError::Overflow(s.to_string());
    let scaled_numerator = mantissa.checked_mul(numerator).ok_or_else(overflow)?;
    let scaled_denominator = 10i128
        .checked_pow(scale)
        .and_then(|p| p.checked_mul(denominator))
        .ok_or_else(overflow)?;

    // round away from zero, as Value() does
    let mut result = scaled_numerator / scaled_denominator;
    if scaled_numerator % scaled_denominator != 0 {
        result += 1;
    }
    if negative {
        result = -result;
    }

    i64::try_from(result).map_err(|_| overflow())
}

/// Parse `123.45` into (12345, 2)
fn parse_decimal(number: &str) -> Option<(i128, u32)> {
    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let digits = format!("{whole}{fraction}");
    let mantissa = if digits.is_empty() {
        0
    } else {
        digits.parse::<i128>().ok()?
    };
    Some((mantissa, u32::try_from(fraction.len()).ok()?))
}

/// Suffix multiplier as a (numerator, denominator) pair
fn multiplier(input: &str, suffix: &str) -> Result<(i128, i128), QuantityError> {
    let unknown = || QuantityError::UnknownSuffix {
        input: input.to_string(),
        suffix: suffix.to_string(),
    };

    let pair = match suffix {
        "" => (1, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1_000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        exp if exp.starts_with(['e', 'E']) => {
            let exponent: i32 = exp[1..].parse().map_err(|_| unknown())?;
            let magnitude = 10i128.checked_pow(exponent.unsigned_abs()).ok_or_else(unknown)?;
            if exponent >= 0 {
                (magnitude, 1)
            } else {
                (1, magnitude)
            }
        }
        _ => return Err(unknown()),
    };
    Ok(pair)
}
