//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace.
    #[error("email cannot contain whitespace")]
    Whitespace,
    /// The input does not contain exactly one @ symbol.
    #[error("email must contain a single @ symbol")]
    MissingAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain is missing a dot-separated, alphabetic top-level domain.
    #[error("email domain must be fully qualified (e.g. example.com)")]
    UnqualifiedDomain,
}

/// An email address.
///
/// Unlike a bare `@` check, the domain must be fully qualified: it needs at
/// least one dot, no empty labels, and an alphabetic top-level domain of two
/// or more characters.
///
/// ## Examples
///
/// ```
/// use larkspur_core::Email;
///
/// assert!(Email::parse("user@example.com").is_ok());
/// assert!(Email::parse("user.name+tag@domain.co.uk").is_ok());
///
/// assert!(Email::parse("").is_err());             // empty
/// assert!(Email::parse("no-at-symbol").is_err()); // missing @
/// assert!(Email::parse("user@localhost").is_err()); // unqualified domain
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Number of local-part characters kept visible by [`Email::obfuscated`].
    const VISIBLE_LOCAL_CHARS: usize = 3;

    /// Parse an `Email` from a string. Surrounding whitespace is trimmed and
    /// the address is lowercased.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains whitespace,
    /// lacks exactly one @ symbol, has an empty local part, or has a domain
    /// that is not fully qualified.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::MissingAtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::MissingAtSymbol);
        }

        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }

        if !is_qualified_domain(domain) {
            return Err(EmailError::UnqualifiedDomain);
        }

        Ok(Self(s.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the local part of the email (before the @).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }

    /// Returns a masked form safe to show back to a visitor.
    ///
    /// Local parts of up to three characters are shown whole; longer ones
    /// keep their first three characters followed by `***`. The domain is
    /// always hidden.
    ///
    /// ```
    /// use larkspur_core::Email;
    ///
    /// assert_eq!(Email::parse("ab@test.com").unwrap().obfuscated(), "ab@***");
    /// assert_eq!(Email::parse("abcdef@test.com").unwrap().obfuscated(), "abc***@***");
    /// ```
    #[must_use]
    pub fn obfuscated(&self) -> String {
        let local = self.local_part();
        if local.chars().count() <= Self::VISIBLE_LOCAL_CHARS {
            format!("{local}@***")
        } else {
            let visible: String = local.chars().take(Self::VISIBLE_LOCAL_CHARS).collect();
            format!("{visible}***@***")
        }
    }
}

fn is_qualified_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return false;
    }

    let labels_valid = labels.iter().all(|label| {
        label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    });

    let tld_valid = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    labels_valid && tld_valid
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
