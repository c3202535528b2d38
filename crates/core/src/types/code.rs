//! Six-digit verification codes sent by the identity provider.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Number of digits in a verification code.
pub const CODE_LENGTH: usize = 6;

/// Keys that are always accepted by the code input regardless of content.
const EDITING_KEYS: &[&str] = &["Backspace", "Tab"];

/// Errors that can occur when parsing a [`VerificationCode`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeError {
    /// The code contains something other than ASCII digits.
    #[error("code must contain digits only")]
    NonDigit,
    /// The code is not exactly six digits long.
    #[error("code must be exactly {CODE_LENGTH} digits")]
    WrongLength,
}

/// A verification code of exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Parse a verification code. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::NonDigit`] if any character is not a digit and
    /// [`CodeError::WrongLength`] if there are not exactly six digits.
    pub fn parse(input: &str) -> Result<Self, CodeError> {
        let input = input.trim();
        if !input.chars().all(|c| c.is_ascii_digit()) {
            return Err(CodeError::NonDigit);
        }
        if input.len() != CODE_LENGTH {
            return Err(CodeError::WrongLength);
        }
        Ok(Self(input.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code field should accept `key` given its `current` value.
    ///
    /// `Backspace` and `Tab` are always accepted. A single digit is accepted
    /// while the field holds fewer than six characters. Everything else is
    /// rejected.
    ///
    /// ```
    /// use larkspur_core::VerificationCode;
    ///
    /// assert!(VerificationCode::accepts_key("7", "123"));
    /// assert!(!VerificationCode::accepts_key("a", "123"));
    /// assert!(!VerificationCode::accepts_key("7", "123456"));
    /// assert!(VerificationCode::accepts_key("Backspace", "123456"));
    /// ```
    #[must_use]
    pub fn accepts_key(key: &str, current: &str) -> bool {
        if EDITING_KEYS.contains(&key) {
            return true;
        }

        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => current.chars().count() < CODE_LENGTH,
            _ => false,
        }
    }

    /// Strip non-digits from pasted or typed input and keep at most six.
    #[must_use]
    pub fn sanitize_input(raw: &str) -> String {
        raw.chars()
            .filter(char::is_ascii_digit)
            .take(CODE_LENGTH)
            .collect()
    }
}

impl TryFrom<String> for VerificationCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VerificationCode> for String {
    fn from(code: VerificationCode) -> Self {
        code.0
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_six_digits() {
        assert_eq!(VerificationCode::parse("123456").unwrap().as_str(), "123456");
        assert_eq!(
            VerificationCode::parse(" 000111 ").unwrap().as_str(),
            "000111"
        );
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(VerificationCode::parse("12345"), Err(CodeError::WrongLength));
        assert_eq!(
            VerificationCode::parse("1234567"),
            Err(CodeError::WrongLength)
        );
        assert_eq!(VerificationCode::parse(""), Err(CodeError::WrongLength));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert_eq!(VerificationCode::parse("12a456"), Err(CodeError::NonDigit));
        assert_eq!(VerificationCode::parse("12-456"), Err(CodeError::NonDigit));
    }

    #[test]
    fn test_accepts_editing_keys() {
        assert!(VerificationCode::accepts_key("Backspace", ""));
        assert!(VerificationCode::accepts_key("Tab", "123456"));
    }

    #[test]
    fn test_rejects_non_digit_keys() {
        for key in ["a", "Enter", "-", " ", "ArrowLeft", "12"] {
            assert!(!VerificationCode::accepts_key(key, ""), "{key}");
        }
    }

    #[test]
    fn test_rejects_seventh_digit() {
        assert!(VerificationCode::accepts_key("9", "12345"));
        assert!(!VerificationCode::accepts_key("9", "123456"));
    }

    #[test]
    fn test_sanitize_truncates_and_strips() {
        assert_eq!(VerificationCode::sanitize_input("12 34-56"), "123456");
        assert_eq!(VerificationCode::sanitize_input("123456789"), "123456");
        assert_eq!(VerificationCode::sanitize_input("abc"), "");
    }
}
