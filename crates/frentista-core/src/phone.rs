//! Phone normalization for a fixed-country-code numbering plan.
//!
//! Numbers arrive in every format operators type them in: "+55 (11)
//! 98888-7777", "011988887777", "5511988887777". Normalization strips
//! everything but digits, drops an existing country prefix, keeps the last
//! 11 local digits (trunk zeros fall off here), and re-prefixes the
//! country code. Pure function, no side effects.

use crate::error::{FrentistaError, Result};

/// Maximum local digits kept after the country prefix (DDD + 9-digit mobile).
const MAX_LOCAL_DIGITS: usize = 11;

pub fn normalize(raw: &str, country_code: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(FrentistaError::Validation(format!(
            "phone '{raw}' has no digits"
        )));
    }

    let local = digits.strip_prefix(country_code).unwrap_or(&digits);
    let local = if local.len() > MAX_LOCAL_DIGITS {
        &local[local.len() - MAX_LOCAL_DIGITS..]
    } else {
        local
    };
    if local.is_empty() {
        return Err(FrentistaError::Validation(format!(
            "phone '{raw}' has no local digits"
        )));
    }

    Ok(format!("{country_code}{local}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_normalized() {
        assert_eq!(normalize("5599999999999", "55").unwrap(), "5599999999999");
    }

    #[test]
    fn test_formatted_input() {
        assert_eq!(
            normalize("+55 (11) 98888-7777", "55").unwrap(),
            "5511988887777"
        );
    }

    #[test]
    fn test_missing_country_code() {
        assert_eq!(normalize("11988887777", "55").unwrap(), "5511988887777");
    }

    #[test]
    fn test_trunk_zero_dropped() {
        // 12 digits without the country prefix: only the last 11 survive.
        assert_eq!(normalize("011988887777", "55").unwrap(), "5511988887777");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(normalize("", "55").is_err());
        assert!(normalize("abc", "55").is_err());
    }
}
