//! Token amount parsing.
//!
//! Amounts travel as decimal strings (`"100."`, `"0.25"`, `"12"`) so that
//! 128-bit values survive JSON untouched. They are only parsed when a
//! comparison or a projection is needed.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::SyncError;

/// Parses a decimal amount string, accepting a trailing `.`.
///
/// # Errors
///
/// Returns [`SyncError::InvalidInput`] if the string is not a decimal.
pub fn parse_amount(raw: &str) -> Result<Decimal, SyncError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    Decimal::from_str(trimmed).map_err(|e| SyncError::InvalidInput(format!("amount {raw:?}: {e}")))
}

/// Formats a decimal back into the wire representation.
#[must_use]
pub fn format_amount(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn trailing_dot_is_accepted() {
        let Ok(value) = parse_amount("100.") else {
            panic!("valid amount");
        };
        assert_eq!(value, Decimal::from(100));
    }

    #[test]
    fn fractional_amounts_parse() {
        let Ok(value) = parse_amount("0.25") else {
            panic!("valid amount");
        };
        assert_eq!(format_amount(value), "0.25");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_amount("ten"),
            Err(SyncError::InvalidInput(_))
        ));
    }
}
