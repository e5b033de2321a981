//! Display formatting for KPI tiles and table cells.

/// Currency symbol used for all amounts.
pub const CURRENCY_SYMBOL: &str = "£";

/// Group the digits of a non-negative integer string with commas.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format an amount for a KPI tile, e.g. `£1,234.50`.
pub fn format_money(amount: f64) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}{}.{}", sign, CURRENCY_SYMBOL, group_thousands(whole), fraction)
}

/// Format a count for a KPI tile, e.g. `1,234`.
pub fn format_count(count: usize) -> String {
    group_thousands(&count.to_string())
}

/// Format an amount for a table cell, e.g. `£1234.50`.
pub fn format_amount_cell(amount: f64) -> String {
    format!("{}{:.2}", CURRENCY_SYMBOL, amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "£0.00");
        assert_eq!(format_money(543.38), "£543.38");
        assert_eq!(format_money(1234.5), "£1,234.50");
        assert_eq!(format_money(1_000_000.0), "£1,000,000.00");
        assert_eq!(format_money(-20.0), "-£20.00");
        assert_eq!(format_money(f64::NAN), "£0.00");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_format_amount_cell() {
        assert_eq!(format_amount_cell(543.38), "£543.38");
        assert_eq!(format_amount_cell(1234.5), "£1234.50");
    }
}
