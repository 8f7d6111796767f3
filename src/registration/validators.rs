//! Field validators for the registration flow.
//!
//! Pure functions; the returned error's text goes straight back to the user.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[а-яА-ЯёЁa-zA-Z\s-]+$").expect("valid name regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Full name: at least 3 characters after trimming; letters, spaces and hyphens only.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() < 3 {
        return Err(ValidationError::NameTooShort);
    }
    if !NAME_RE.is_match(name) {
        return Err(ValidationError::NameInvalidChars);
    }
    Ok(())
}

/// Email: `local@domain.tld` with an ASCII local part and a TLD of 2+ letters.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmailEmpty);
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::EmailInvalid);
    }
    Ok(())
}

/// Russian phone number: 11 digits starting with 7 or 8, any punctuation ignored.
///
/// Only validates; the number is stored as the user typed it.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() {
        return Err(ValidationError::PhoneEmpty);
    }
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 11 || !(digits.starts_with('7') || digits.starts_with('8')) {
        return Err(ValidationError::PhoneInvalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_accepts_latin_and_cyrillic() {
        assert!(validate_name("Иван Петров").is_ok());
        assert!(validate_name("Anna-Maria Smith").is_ok());
        assert!(validate_name("Пётр Ёлкин").is_ok());
    }

    #[test]
    fn name_too_short() {
        assert_eq!(validate_name(""), Err(ValidationError::NameTooShort));
        assert_eq!(validate_name("Ян"), Err(ValidationError::NameTooShort));
        assert_eq!(validate_name("   ab   "), Err(ValidationError::NameTooShort));
    }

    #[test]
    fn name_rejects_digits_and_punctuation() {
        for bad in ["Ivan 2", "R2-D2", "John.Smith", "Иван!", "O'Brien", "a_b_c"] {
            assert_eq!(
                validate_name(bad),
                Err(ValidationError::NameInvalidChars),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn name_error_text_is_user_facing() {
        let err = validate_name("x").unwrap_err();
        assert_eq!(err.to_string(), "Имя должно содержать минимум 3 символа");
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert_eq!(validate_email("a@b"), Err(ValidationError::EmailInvalid));
        assert_eq!(validate_email(""), Err(ValidationError::EmailEmpty));
        assert_eq!(validate_email("a@b.c"), Err(ValidationError::EmailInvalid));
        assert_eq!(validate_email("no-at.example.com"), Err(ValidationError::EmailInvalid));
        assert_eq!(validate_email("имя@почта.рф"), Err(ValidationError::EmailInvalid));
    }

    #[test]
    fn phone_accepts_formatted_russian_numbers() {
        assert!(validate_phone("+7 999 822-12-77").is_ok());
        assert!(validate_phone("89998221277").is_ok());
        assert!(validate_phone("8 (999) 822 12 77").is_ok());
    }

    #[test]
    fn phone_rejects_wrong_length_or_prefix() {
        assert_eq!(validate_phone("123"), Err(ValidationError::PhoneInvalid));
        assert_eq!(validate_phone("+1 999 822-12-77"), Err(ValidationError::PhoneInvalid));
        assert_eq!(validate_phone("+7 999 822-12-777"), Err(ValidationError::PhoneInvalid));
        assert_eq!(validate_phone("phone"), Err(ValidationError::PhoneInvalid));
        assert_eq!(validate_phone(""), Err(ValidationError::PhoneEmpty));
    }
}
