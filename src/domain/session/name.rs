use std::fmt;

use serde::{Deserialize, Serialize};

const MAX_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionNameError {
    #[error("Session name cannot be empty")]
    Empty,
    #[error("Session name too long: {len} chars (max {max})")]
    TooLong { len: usize, max: usize },
    #[error("Session name contains control characters")]
    ControlCharacter,
}

/// Human label for a registered target database, shown in session listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(name: impl Into<String>) -> Result<Self, SessionNameError> {
        let name = name.into();
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(SessionNameError::Empty);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(SessionNameError::ControlCharacter);
        }

        let char_count = trimmed.chars().count();
        if char_count > MAX_LENGTH {
            return Err(SessionNameError::TooLong {
                len: char_count,
                max: MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SessionName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionName::new(s).map_err(serde::de::Error::custom)
    }
}
