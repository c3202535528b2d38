//! Password policy.
//!
//! A password is accepted only when five independent checks hold at the same
//! time. The checks are exposed individually so forms can show which
//! requirements are still missing while the visitor types.

use core::fmt;

/// Minimum password length in characters.
pub const MIN_LENGTH: usize = 8;
/// Maximum password length in characters.
pub const MAX_LENGTH: usize = 20;

/// Error returned when a password fails one or more policy checks.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("password must {}", .0.describe_missing())]
pub struct PasswordError(pub PasswordChecks);

/// Result of evaluating each password requirement independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PasswordChecks {
    /// Between 8 and 20 characters.
    pub length: bool,
    /// At least one lowercase letter.
    pub lowercase: bool,
    /// At least one uppercase letter.
    pub uppercase: bool,
    /// At least one digit.
    pub digit: bool,
    /// At least one special character.
    pub special: bool,
}

impl PasswordChecks {
    /// Evaluate every requirement against `candidate`.
    #[must_use]
    pub fn evaluate(candidate: &str) -> Self {
        let len = candidate.chars().count();
        Self {
            length: (MIN_LENGTH..=MAX_LENGTH).contains(&len),
            lowercase: candidate.chars().any(char::is_lowercase),
            uppercase: candidate.chars().any(char::is_uppercase),
            digit: candidate.chars().any(|c| c.is_ascii_digit()),
            special: candidate.chars().any(|c| c.is_ascii_punctuation()),
        }
    }

    /// Whether every requirement holds.
    #[must_use]
    pub const fn all_pass(&self) -> bool {
        self.length && self.lowercase && self.uppercase && self.digit && self.special
    }

    fn describe_missing(&self) -> String {
        let mut missing = Vec::new();
        if !self.length {
            missing.push(format!("be {MIN_LENGTH}-{MAX_LENGTH} characters long"));
        }
        if !self.lowercase {
            missing.push("contain a lowercase letter".to_string());
        }
        if !self.uppercase {
            missing.push("contain an uppercase letter".to_string());
        }
        if !self.digit {
            missing.push("contain a number".to_string());
        }
        if !self.special {
            missing.push("contain a special character".to_string());
        }
        if missing.is_empty() {
            return "meet the password requirements".to_string();
        }
        missing.join(", ")
    }
}

/// A password that satisfies every policy check.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Validate `candidate` against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError`] carrying the individual check results when
    /// any requirement fails.
    ///
    /// ```
    /// use larkspur_core::Password;
    ///
    /// assert!(Password::parse("Abcdef1!").is_ok());
    /// assert!(Password::parse("abcdefgh").is_err());
    /// ```
    pub fn parse(candidate: &str) -> Result<Self, PasswordError> {
        let checks = PasswordChecks::evaluate(candidate);
        if checks.all_pass() {
            Ok(Self(candidate.to_owned()))
        } else {
            Err(PasswordError(checks))
        }
    }

    /// Expose the password for handing to the identity provider.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password_passes_all_checks() {
        let checks = PasswordChecks::evaluate("Abcdef1!");
        assert!(checks.length);
        assert!(checks.lowercase);
        assert!(checks.uppercase);
        assert!(checks.digit);
        assert!(checks.special);
        assert!(checks.all_pass());
        assert!(Password::parse("Abcdef1!").is_ok());
    }

    #[test]
    fn test_lowercase_only_fails() {
        let checks = PasswordChecks::evaluate("abcdefgh");
        assert!(checks.length);
        assert!(checks.lowercase);
        assert!(!checks.uppercase);
        assert!(!checks.digit);
        assert!(!checks.special);

        let err = Password::parse("abcdefgh").unwrap_err();
        assert_eq!(err.0, checks);
    }

    #[test]
    fn test_length_bounds() {
        assert!(!PasswordChecks::evaluate("Ab1!xyz").length);
        assert!(PasswordChecks::evaluate("Ab1!xyzw").length);
        assert!(PasswordChecks::evaluate("Ab1!xyzwAb1!xyzwAb1!").length);
        assert!(!PasswordChecks::evaluate("Ab1!xyzwAb1!xyzwAb1!x").length);
    }

    #[test]
    fn test_each_predicate_is_required() {
        // Each candidate misses exactly one requirement.
        for candidate in ["Ab1!", "ABCDEF1!", "abcdef1!", "Abcdefg!", "Abcdefg1"] {
            assert!(
                Password::parse(candidate).is_err(),
                "{candidate} should be rejected"
            );
        }
    }

    #[test]
    fn test_error_message_lists_missing_requirements() {
        let err = Password::parse("abcdefgh").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("uppercase"));
        assert!(message.contains("number"));
        assert!(message.contains("special"));
        assert!(!message.contains("lowercase"));
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = Password::parse("Abcdef1!").unwrap();
        assert!(!format!("{password:?}").contains("Abcdef1!"));
    }
}
