//! Presentation helpers for numbers and addresses.

/// Format a number with en-US thousands grouping and a fixed number of decimals.
///
/// `format_number(1234.5, 2)` → `"1,234.50"`.
pub fn format_number(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Format a USD amount: `$1,234.50`, `-$12.00`.
pub fn format_usd(value: f64) -> String {
    let body = format_number(value, 2);
    match body.strip_prefix('-') {
        Some(rest) => format!("-${}", rest),
        None => format!("${}", body),
    }
}

/// Format a utilization percentage. An unbounded rate renders as `∞`.
pub fn format_utilization(rate: f64) -> String {
    if rate.is_infinite() {
        return "∞".to_string();
    }
    format!("{}%", format_number(rate, 2))
}

/// Shorten a long address to `first10...last8`. Short inputs are returned unchanged.
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 20 {
        return address.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_grouping() {
        assert_eq!(format_number(0.0, 2), "0.00");
        assert_eq!(format_number(999.0, 2), "999.00");
        assert_eq!(format_number(1234.5, 2), "1,234.50");
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(1000.0, 0), "1,000");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-1234.5, 2), "-1,234.50");
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_number_non_finite() {
        assert_eq!(format_number(f64::INFINITY, 2), "∞");
        assert_eq!(format_number(f64::NEG_INFINITY, 2), "-∞");
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(1600.0), "$1,600.00");
        assert_eq!(format_usd(-12.0), "-$12.00");
    }

    #[test]
    fn test_format_utilization() {
        assert_eq!(format_utilization(100.0), "100.00%");
        assert_eq!(format_utilization(f64::INFINITY), "∞");
    }

    #[test]
    fn test_truncate_address() {
        assert_eq!(truncate_address("0xshort"), "0xshort");
        assert_eq!(
            truncate_address("0x1234567890abcdef1234567890abcdef12345678"),
            "0x12345678...12345678"
        );
    }
}
