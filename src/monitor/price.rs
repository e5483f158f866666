use num_format::{Locale, ToFormattedString};

use crate::error::MonitorError;

/// Normalizes a currency-formatted display string (`$10,011`) into whole units.
///
/// Every non-digit character is dropped before parsing, so the same rule applies
/// to ledger prices and freshly sampled ones and their values compare directly.
pub fn parse_price(display: &str) -> Result<i64, MonitorError> {
    let digits: String = display.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(MonitorError::Parse(format!(
            "no digits in price '{}'",
            display
        )));
    }

    digits
        .parse::<i64>()
        .map_err(|e| MonitorError::Parse(format!("price '{}' out of range: {}", display, e)))
}

/// Renders whole units the way the monitored page shows them, e.g. `$10,011`.
pub fn format_price(value: i64, symbol: &str) -> String {
    let grouped = value.unsigned_abs().to_formatted_string(&Locale::en);
    if value < 0 {
        format!("-{}{}", symbol, grouped)
    } else {
        format!("{}{}", symbol, grouped)
    }
}
