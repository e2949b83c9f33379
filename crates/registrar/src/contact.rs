//! Contact formatting helpers shared by provider adapters.

use crate::error::RegistrarError;

/// Normalize a phone number to the `+<countrycode>.<nationalnumber>` form
/// registrars expect.
///
/// `calling_code` is the numeric country calling code (e.g. `"1"`, `"44"`).
/// If the raw number already carries the calling code as a prefix (with or
/// without a leading `+`), the prefix is folded in rather than duplicated.
///
/// Fails loudly on numbers that cannot form a valid E.164-like value;
/// silent truncation would produce contacts registrars reject at purchase
/// time, long after the user left.
pub fn format_phone(raw: &str, calling_code: &str) -> Result<String, RegistrarError> {
    if calling_code.is_empty()
        || calling_code.len() > 3
        || !calling_code.chars().all(|c| c.is_ascii_digit())
    {
        return Err(RegistrarError::InvalidContact(format!(
            "invalid country calling code: {calling_code:?}"
        )));
    }

    let had_plus = raw.trim_start().starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(RegistrarError::InvalidContact(format!(
            "phone number contains no digits: {raw:?}"
        )));
    }

    // A `+`-prefixed number embeds its calling code; otherwise only strip
    // the code when the remainder still looks like a full national number.
    let national = if let Some(rest) = digits.strip_prefix(calling_code) {
        if had_plus || rest.len() >= 7 {
            rest
        } else {
            digits.as_str()
        }
    } else if had_plus {
        return Err(RegistrarError::InvalidContact(format!(
            "phone number {raw:?} does not match calling code +{calling_code}"
        )));
    } else {
        digits.as_str()
    };

    if national.len() < 7 || national.len() + calling_code.len() > 15 {
        return Err(RegistrarError::InvalidContact(format!(
            "phone number has an invalid length: {raw:?}"
        )));
    }

    Ok(format!("+{calling_code}.{national}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_national_numbers() {
        assert_eq!(format_phone("(555) 123-4567", "1").unwrap(), "+1.5551234567");
        assert_eq!(format_phone("020 7946 0958", "44").unwrap(), "+44.2079460958");
    }

    #[test]
    fn folds_in_an_existing_calling_code() {
        assert_eq!(format_phone("+1 555 123 4567", "1").unwrap(), "+1.5551234567");
        assert_eq!(format_phone("15551234567", "1").unwrap(), "+1.5551234567");
    }

    #[test]
    fn rejects_garbage_instead_of_truncating() {
        assert!(format_phone("call me", "1").is_err());
        assert!(format_phone("12345", "1").is_err());
        assert!(format_phone("5551234567", "").is_err());
        assert!(format_phone("+44 20 7946 0958", "1").is_err());
    }

    #[test]
    fn rejects_overlong_numbers() {
        assert!(format_phone("5551234567890123456", "1").is_err());
    }
}
