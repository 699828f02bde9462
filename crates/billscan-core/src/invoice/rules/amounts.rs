//! Amount parsing for model output and receipt text.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use super::patterns::CURRENCY_MARKER;

/// Parse a non-negative amount.
///
/// Accepts currency markers (`₹`, `Rs.`, `INR`, `$`), comma grouping in both
/// western and lakh styles and surrounding whitespace. Negative or
/// unparseable values yield `None`.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let stripped = CURRENCY_MARKER.replace_all(s, "");
    let trimmed = stripped.trim().trim_end_matches("/-").trim();
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{00a0}'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let amount = Decimal::from_str(&cleaned).ok()?;
    (!amount.is_sign_negative()).then_some(amount)
}

/// Read an amount from a JSON value the model produced (number or string).
pub fn amount_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let amount = Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok()?;
            (!amount.is_sign_negative()).then_some(amount)
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Format amount in Indian grouping (1,23,456.78).
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let s = format!("{:.2}", rounded);
    let (int_part, dec_part) = s.split_once('.').unwrap_or((&s, "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let grouped = if digits.len() <= 3 {
        digits.to_string()
    } else {
        let (head, last3) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), last3)
    };

    format!("{}{}.{}", sign, grouped, dec_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_plain() {
        assert_eq!(parse_amount("45.00"), Some(Decimal::new(4500, 2)));
        assert_eq!(parse_amount("  120 "), Some(Decimal::new(120, 0)));
    }

    #[test]
    fn test_parse_amount_with_currency() {
        assert_eq!(parse_amount("₹1,23,456.50"), Some(Decimal::new(12345650, 2)));
        assert_eq!(parse_amount("Rs. 1,234.50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_amount("INR 99"), Some(Decimal::new(99, 0)));
        assert_eq!(parse_amount("$5.25"), Some(Decimal::new(525, 2)));
        assert_eq!(parse_amount("Rs. 250/-"), Some(Decimal::new(250, 0)));
    }

    #[test]
    fn test_parse_amount_rejects() {
        assert_eq!(parse_amount("-12.00"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_amount_from_json() {
        assert_eq!(amount_from_json(&json!(45.5)), Some(Decimal::new(455, 1)));
        assert_eq!(amount_from_json(&json!(12)), Some(Decimal::new(12, 0)));
        assert_eq!(amount_from_json(&json!("₹ 30")), Some(Decimal::new(30, 0)));
        assert_eq!(amount_from_json(&json!(-3)), None);
        assert_eq!(amount_from_json(&json!(null)), None);
        assert_eq!(amount_from_json(&json!([1])), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(12345650, 2)), "1,23,456.50");
        assert_eq!(format_amount(Decimal::new(4500, 2)), "45.00");
        assert_eq!(format_amount(Decimal::new(100000000, 2)), "10,00,000.00");
    }
}
