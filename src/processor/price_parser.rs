use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static PRICE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("price pattern is valid")
});

/// Pulls the first numeric amount out of a price label such as `"A$19.99"`,
/// `"Rs. 1,500"` or `"12.50 AUD"`. Currency markers and thousands separators
/// are dropped, a leading minus sign is kept. Returns `None` when no number
/// is present.
pub fn parse_price(text: &str) -> Option<f64> {
    let found = PRICE_NUMBER.find(text.trim())?;
    let cleaned = found.as_str().replace(',', "");
    f64::from_str(&cleaned).ok().filter(|value| value.is_finite())
}

/// Accepts a price from JSON that may arrive as a number, a label string or
/// `null`.
pub fn price_from_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(label) => parse_price(label),
        _ => None,
    }
}
