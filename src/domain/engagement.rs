//! Humanized engagement counts ("1.2K", "3M", "1,234") to integers.
use crate::domain::model::Interpreted;

/// Parses a count such as `"1.2K"` into `1200`. Empty input is `0`; anything
/// unreadable is `0` with `defaulted = true`.
pub fn parse_metric(raw: &str) -> Interpreted<u64> {
    let cleaned = raw.trim().replace(',', "").to_ascii_uppercase();
    if cleaned.is_empty() {
        return Interpreted::exact(0);
    }

    let (number, multiplier) = match cleaned.as_bytes()[cleaned.len() - 1] {
        b'K' => (&cleaned[..cleaned.len() - 1], 1_000),
        b'M' => (&cleaned[..cleaned.len() - 1], 1_000_000),
        b'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000),
        _ => (cleaned.as_str(), 1),
    };

    match scale_decimal(number.trim(), multiplier) {
        Some(v) => Interpreted::exact(v),
        None => Interpreted::fallback(0),
    }
}

/// Reads the count out of an accessibility label like `"1,234 Likes. Like"`.
/// A label with no digits at all ("Reply") is an exact zero.
pub fn parse_label_count(label: &str) -> Interpreted<u64> {
    if !label.bytes().any(|b| b.is_ascii_digit()) {
        return Interpreted::exact(0);
    }
    parse_metric(label.split_whitespace().next().unwrap_or(""))
}

// Integer arithmetic keeps "1.2K" at exactly 1200.
fn scale_decimal(number: &str, multiplier: u64) -> Option<u64> {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<u64>().ok()?
    };
    let mut value = whole.checked_mul(multiplier)?;

    if !frac_part.is_empty() {
        let digits = frac_part.len().min(18) as u32;
        let frac: u64 = frac_part[..digits as usize].parse().ok()?;
        let scale = 10u64.pow(digits);
        let frac_value = u128::from(frac) * u128::from(multiplier) / u128::from(scale);
        value = value.checked_add(u64::try_from(frac_value).ok()?)?;
    }
    Some(value)
}
