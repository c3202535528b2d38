//! Visitor-facing messages for identity provider errors.

/// Shown for any error name missing from [`MESSAGES`].
pub const GENERIC_FALLBACK: &str = "Something went wrong. Please try again.";

/// Provider exception name to message.
pub const MESSAGES: &[(&str, &str)] = &[
    (
        "UserNotFoundException",
        "We couldn't find an account with that email address.",
    ),
    (
        "InvalidParameterException",
        "We can't reset the password for this account. Please verify your email address first.",
    ),
    (
        "LimitExceededException",
        "Too many attempts. Please wait a while before trying again.",
    ),
    (
        "TooManyRequestsException",
        "Too many attempts. Please wait a while before trying again.",
    ),
    (
        "CodeMismatchException",
        "The code you entered is incorrect. Please check it and try again.",
    ),
    (
        "ExpiredCodeException",
        "That code has expired. Please request a new one.",
    ),
    ("NotAuthorizedException", "Incorrect email or password."),
    (
        "UsernameExistsException",
        "An account with this email address already exists.",
    ),
    (
        "InvalidPasswordException",
        "That password doesn't meet the requirements.",
    ),
    (
        "UserNotConfirmedException",
        "Please verify your email address before signing in.",
    ),
];

/// Look up the message for a provider exception name.
#[must_use]
pub fn message_for(name: &str) -> &'static str {
    MESSAGES
        .iter()
        .find(|(key, _)| *key == name)
        .map_or(GENERIC_FALLBACK, |(_, message)| message)
}
