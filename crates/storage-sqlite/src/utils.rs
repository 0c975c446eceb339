//! Shared helpers for the storage layer.

use log::warn;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a stored decimal string, falling back to ZERO on malformed data.
///
/// Amounts are stored as TEXT; a corrupt cell should not take the whole
/// read path down, so parse failures are logged and zeroed.
pub fn parse_decimal_tolerant(value_str: &str, field_name: &str) -> Decimal {
    match Decimal::from_str(value_str) {
        Ok(d) => d,
        Err(e) => {
            warn!(
                "Failed to parse {} '{}' as Decimal ({}). Falling back to ZERO.",
                field_name, value_str, e
            );
            Decimal::ZERO
        }
    }
}

/// Serializes an optional decimal for storage.
pub fn decimal_to_opt_string(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}
