//! Localized (pt-BR) amount parsing and formatting.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a Brazilian-formatted amount (e.g. "R$ 1.234,56", "10,50", "1,0000").
///
/// Currency symbols and spaces are ignored. When both `.` and `,` occur, the
/// one appearing last is the decimal separator; a separator repeated more than
/// once is a thousands separator. A `-` before the first digit negates.
pub fn parse_brl_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let first_digit = s.find(|c: char| c.is_ascii_digit())?;
    let negative = s[..first_digit].contains('-');

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    let normalized = match (commas, dots) {
        (0, 0) => cleaned,
        (c, 0) if c > 1 => cleaned.replace(',', ""),
        (_, 0) => cleaned.replace(',', "."),
        (0, d) if d > 1 => cleaned.replace('.', ""),
        (0, _) => cleaned,
        _ => {
            let comma_pos = cleaned.rfind(',');
            let dot_pos = cleaned.rfind('.');
            match (comma_pos, dot_pos) {
                (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
                _ => cleaned.replace(',', ""),
            }
        }
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Format an amount in Brazilian style (1.234,56).
pub fn format_brl_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.abs());
    let Some((integer_part, decimal_part)) = s.split_once('.') else {
        return s;
    };

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    if amount.is_sign_negative() && !amount.is_zero() {
        formatted.push('-');
    }

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    format!("{},{}", formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_brl_amount() {
        assert_eq!(parse_brl_amount("10,50"), Some(dec("10.50")));
        assert_eq!(parse_brl_amount("R$ 1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_brl_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_brl_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_brl_amount("1.234.567"), Some(dec("1234567")));
        assert_eq!(parse_brl_amount(" 14,50 "), Some(dec("14.50")));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_brl_amount("1,0000"), Some(dec("1.0000")));
        assert_eq!(parse_brl_amount("0,250"), Some(dec("0.250")));
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(parse_brl_amount("-10,50"), Some(dec("-10.50")));
        assert_eq!(parse_brl_amount("R$ -3,00"), Some(dec("-3.00")));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(parse_brl_amount(""), None);
        assert_eq!(parse_brl_amount("N/A"), None);
        assert_eq!(parse_brl_amount("R$"), None);
    }

    #[test]
    fn test_format_brl_amount() {
        assert_eq!(format_brl_amount(dec("1234.56")), "1.234,56");
        assert_eq!(format_brl_amount(dec("12345678.9")), "12.345.678,90");
        assert_eq!(format_brl_amount(dec("10.5")), "10,50");
        assert_eq!(format_brl_amount(dec("-7")), "-7,00");
    }
}
