// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input validation for phone numbers and country codes.
//!
//! Session phones follow the Indonesian mobile convention: the national
//! number without country code, starting with 8. Target phones are digits
//! with leading zeros stripped; the result must not start with 0.

use std::sync::LazyLock;

use regex::Regex;

use kirim_core::KirimError;

static SESSION_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^8\d+$").expect("static regex"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("static regex"));

/// A session's own phone number: must start with 8 followed by digits.
pub fn validate_session_phone(phone: &str) -> Result<(), KirimError> {
    if SESSION_PHONE.is_match(phone) {
        Ok(())
    } else {
        Err(KirimError::validation(
            "whatsappPhoneNumber",
            "must start with 8 followed with numbers",
        ))
    }
}

/// A destination phone: digits only; leading zeros are stripped and the
/// remainder must be non-empty (so it cannot start with 0).
pub fn normalize_target_phone(phone: &str) -> Result<String, KirimError> {
    if phone.is_empty() {
        return Err(KirimError::validation("targetPhoneNumber", "can not be empty"));
    }
    if !DIGITS.is_match(phone) {
        return Err(KirimError::validation(
            "targetPhoneNumber",
            "must be a set of numbers and must not start with 0",
        ));
    }
    let normalized = phone.trim_start_matches('0');
    if normalized.is_empty() {
        return Err(KirimError::validation(
            "targetPhoneNumber",
            "must be a set of numbers and must not start with 0",
        ));
    }
    Ok(normalized.to_string())
}

/// A country code override: digits only.
pub fn validate_country_code(code: &str) -> Result<(), KirimError> {
    if DIGITS.is_match(code) {
        Ok(())
    } else {
        Err(KirimError::validation(
            "countryCode",
            "must be a set of numbers",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_phone_accepts_the_8xxx_convention() {
        assert!(validate_session_phone("81234567890").is_ok());
        assert!(validate_session_phone("8").is_err());
        assert!(validate_session_phone("0812345").is_err());
        assert!(validate_session_phone("62812345").is_err());
        assert!(validate_session_phone("").is_err());
        assert!(validate_session_phone("8abc").is_err());
    }

    #[test]
    fn target_phone_strips_leading_zeros() {
        assert_eq!(normalize_target_phone("81198765").unwrap(), "81198765");
        assert_eq!(normalize_target_phone("081198765").unwrap(), "81198765");
        assert_eq!(normalize_target_phone("0081198765").unwrap(), "81198765");
    }

    #[test]
    fn target_phone_rejects_non_digits_and_zero_only() {
        assert!(normalize_target_phone("").is_err());
        assert!(normalize_target_phone("+6281").is_err());
        assert!(normalize_target_phone("8 1 1").is_err());
        assert!(normalize_target_phone("000").is_err());
    }

    #[test]
    fn country_code_is_digits_only() {
        assert!(validate_country_code("62").is_ok());
        assert!(validate_country_code("1").is_ok());
        assert!(validate_country_code("+62").is_err());
        assert!(validate_country_code("").is_err());
    }

    #[test]
    fn validation_errors_carry_the_field_name() {
        let err = validate_session_phone("x").unwrap_err();
        match err {
            KirimError::Validation { field, .. } => assert_eq!(field, "whatsappPhoneNumber"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
