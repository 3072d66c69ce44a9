use regex::Regex;

/// Parse a money amount out of raw text. Currency symbols and grouping
/// noise are stripped, comma decimals accepted. Shopify themes often emit
/// prices in minor units (8900 = 89.00); an integral amount >= 100 with no
/// decimal point is treated as cents.
pub fn normalize_amount(raw: &str) -> Option<f64> {
    if raw.trim().is_empty() {
        return None;
    }
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let num = digits.replace(',', ".");
    let shape = Regex::new(r"^\d+\.?\d*$").unwrap();
    if !shape.is_match(&num) {
        return None;
    }
    let val: f64 = num.parse().ok()?;
    if val >= 100.0 && !num.contains('.') {
        return Some(val / 100.0);
    }
    Some(val)
}

/// Amount from an embedded-JSON value, which may be a decimal string,
/// a plain number or a cents integer.
pub fn amount_from_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => normalize_amount(s),
        serde_json::Value::Number(n) => normalize_amount(&n.to_string()),
        _ => None,
    }
}

/// Resolve (price, sale) from the current price and an optional compare-at
/// price. Sale is true only when the compare-at price is strictly higher.
pub fn price_and_sale(price: Option<f64>, compare_at: Option<f64>) -> (Option<f64>, bool) {
    match (price, compare_at) {
        (Some(p), Some(c)) if c > p => (Some(p), true),
        (p, _) => (p, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_decimal() {
        assert_eq!(normalize_amount("89.90"), Some(89.9));
    }

    #[test]
    fn currency_symbols_stripped() {
        assert_eq!(normalize_amount("€ 49.00 EUR"), Some(49.0));
        assert_eq!(normalize_amount("$120.50"), Some(120.5));
    }

    #[test]
    fn comma_decimal() {
        assert_eq!(normalize_amount("59,95"), Some(59.95));
    }

    #[test]
    fn integral_cents_divided() {
        assert_eq!(normalize_amount("8900"), Some(89.0));
    }

    #[test]
    fn small_integral_kept() {
        assert_eq!(normalize_amount("89"), Some(89.0));
    }

    #[test]
    fn garbage_rejected() {
        assert_eq!(normalize_amount("1.299,00"), None);
        assert_eq!(normalize_amount("free"), None);
        assert_eq!(normalize_amount(""), None);
    }

    #[test]
    fn cents_from_json_number() {
        assert_eq!(amount_from_json(&serde_json::json!(8900)), Some(89.0));
        assert_eq!(amount_from_json(&serde_json::json!("49.00")), Some(49.0));
    }

    #[test]
    fn sale_requires_higher_compare_at() {
        assert_eq!(price_and_sale(Some(89.0), Some(120.0)), (Some(89.0), true));
        assert_eq!(price_and_sale(Some(89.0), Some(89.0)), (Some(89.0), false));
        assert_eq!(price_and_sale(Some(89.0), None), (Some(89.0), false));
        assert_eq!(price_and_sale(None, Some(120.0)), (None, false));
    }
}
