//! Numeric formatting for the shared store's human readers: two decimals,
//! space as thousands separator, comma as decimal separator ("1 234,50").
//! Parsing accepts the same shape back, plus plain dot-decimal strings.

/// Format a metric cell. Undefined values render as the literal "N/A".
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format_decimal(v),
        _ => "N/A".to_string(),
    }
}

fn format_decimal(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = format!("{:.2}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((&rounded, "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped},{frac_part}")
}

/// Parse a locale-formatted cell back to a number. Returns None for "N/A",
/// empty cells, and anything non-numeric.
pub fn parse_decimal(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}
