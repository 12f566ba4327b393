//! Human-entered decimal amounts and their base-unit integer form.
//!
//! All scaling is done on the digit string, never through floating point, so
//! 18-decimal amounts keep every digit.

use num_bigint::BigUint;

use crate::error::Error;

/// Check that `input` is a strictly positive plain decimal (`^\d+(\.\d+)?$`).
///
/// Returns the trimmed amount on success.
pub fn validate_amount(input: &str) -> Result<&str, Error> {
    let trimmed = input.trim();
    let (integer, fraction) = split_decimal(trimmed)
        .ok_or_else(|| Error::MalformedAmount(format!("'{trimmed}' is not a positive number")))?;

    let all_zero = integer.bytes().chain(fraction.bytes()).all(|b| b == b'0');
    if all_zero {
        return Err(Error::MalformedAmount(format!(
            "'{trimmed}' is not a positive number"
        )));
    }
    Ok(trimmed)
}

/// Split `s` into integer and fractional digit runs, or `None` if it does not
/// match the plain decimal pattern.
fn split_decimal(s: &str) -> Option<(&str, &str)> {
    let (integer, fraction) = match s.split_once('.') {
        Some((i, f)) => {
            if f.is_empty() {
                return None;
            }
            (i, f)
        }
        None => (s, ""),
    };
    if integer.is_empty() {
        return None;
    }
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(integer) || !digits_only(fraction) {
        return None;
    }
    Some((integer, fraction))
}

/// Scale a human amount (e.g. `"1.5"`) to base units at `decimals`.
///
/// Amounts with more fractional digits than the asset supports are rejected
/// rather than rounded.
pub fn parse_units(human: &str, decimals: u8) -> Result<BigUint, Error> {
    let human = validate_amount(human)?;
    let (integer, fraction) = split_decimal(human)
        .ok_or_else(|| Error::MalformedAmount(format!("'{human}' is not a positive number")))?;

    let decimals = decimals as usize;
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals {
        return Err(Error::MalformedAmount(format!(
            "'{human}' has more than {decimals} fractional digits"
        )));
    }

    let mut digits = String::with_capacity(integer.len() + decimals);
    digits.push_str(integer);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat_n('0', decimals - fraction.len()));

    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| Error::MalformedAmount(format!("'{human}' is not a positive number")))
}

/// Render base units as a human amount, without trailing fractional zeros.
pub fn format_units(amount: &BigUint, decimals: u8) -> String {
    let decimals = decimals as usize;
    let digits = format!("{:0>width$}", amount.to_string(), width = decimals + 1);
    let (integer, fraction) = digits.split_at(digits.len() - decimals);
    match fraction.trim_end_matches('0') {
        "" => integer.to_string(),
        fraction => format!("{integer}.{fraction}"),
    }
}
