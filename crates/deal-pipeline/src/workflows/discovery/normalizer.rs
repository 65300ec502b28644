pub(crate) fn normalize_cell(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase()
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match normalize_cell(value).as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Accepts `350000`, `$350,000` and `350000.00`. Exponent notation and
/// amounts that do not fit in a `u64` are rejected.
pub(crate) fn parse_price(value: &str) -> Option<u64> {
    let digits: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let amount: f64 = digits.parse().ok()?;
    let rounded = amount.round();
    (rounded < u64::MAX as f64).then_some(rounded as u64)
}

/// Scores are 0-100; fractional scores round to the nearest integer.
pub(crate) fn parse_score(value: &str) -> Option<u8> {
    let score: f64 = value.trim().parse().ok()?;
    (0.0..=100.0)
        .contains(&score)
        .then(|| score.round() as u8)
}
