//! User identifiers for enrolled templates.

/// Longest accepted identifier, in bytes.
pub const MAX_USER_ID_BYTES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserIdError {
    #[error("User ID must not be empty")]
    Empty,

    #[error("User ID exceeds {MAX_USER_ID_BYTES} bytes")]
    TooLong,

    #[error("User ID must not contain control characters")]
    ControlCharacter,
}

/// Caller-chosen identifier keying one stored template.
///
/// Surrounding whitespace is trimmed; the remainder is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    /// # Errors
    /// Returns `UserIdError` when the trimmed id is empty, too long or
    /// contains control characters.
    pub fn new(raw: &str) -> Result<Self, UserIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserIdError::Empty);
        }
        if trimmed.len() > MAX_USER_ID_BYTES {
            return Err(UserIdError::TooLong);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(UserIdError::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
