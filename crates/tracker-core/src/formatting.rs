//! Number rendering for hover summaries and tabular output.

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use tracker_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let factor = 10_f64.powi(decimals as i32);
    let rounded = (value.abs() * factor).round() / factor;

    let grouped = group_thousands(&(rounded.trunc() as u64).to_string());
    let body = if decimals == 0 {
        grouped
    } else {
        // "0.50" -> ".50"
        let frac = format!("{:.prec$}", rounded.fract(), prec = decimals as usize);
        format!("{}{}", grouped, &frac[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format an integer count with thousands separators.
///
/// ```
/// use tracker_core::formatting::format_count;
///
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// assert_eq!(format_count(-42), "-42");
/// ```
pub fn format_count(value: i64) -> String {
    let grouped = group_thousands(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format a signed change with an explicit `+` for positive values.
pub fn format_signed(value: f64, decimals: u32) -> String {
    let body = format_number(value, decimals);
    if value > 0.0 && body != format_number(0.0, decimals) {
        format!("+{}", body)
    } else {
        body
    }
}

/// Render an optional derived value, using `n/a` for undefined entries.
pub fn format_optional(value: Option<f64>, decimals: u32) -> String {
    match value {
        Some(v) if v.is_finite() => format_number(v, decimals),
        _ => "n/a".to_string(),
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_decimals() {
        assert_eq!(format_number(123.456, 2), "123.46");
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero() {
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(-1_234_567), "-1,234,567");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed(12.5, 1), "+12.5");
        assert_eq!(format_signed(-3.0, 0), "-3");
        assert_eq!(format_signed(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(2.5), 2), "2.50");
        assert_eq!(format_optional(None, 2), "n/a");
        assert_eq!(format_optional(Some(f64::INFINITY), 2), "n/a");
    }
}
