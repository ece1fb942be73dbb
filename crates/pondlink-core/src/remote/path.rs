use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A validated, slash-separated database path such as `devices/relay1`.
///
/// Leading and trailing slashes are stripped. Every segment is non-empty and
/// free of the characters the database refuses in keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    pub fn new(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(invalid(raw, "empty segment"));
            }
            if let Some(c) = segment.chars().find(|c| FORBIDDEN.contains(c) || c.is_control()) {
                return Err(invalid(raw, &format!("segment '{segment}' contains '{}'", c.escape_default())));
            }
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// `devices/relay{number}`.
    pub(crate) fn relay(number: u64) -> Self {
        Self(format!("devices/relay{number}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn invalid(path: &str, reason: &str) -> CoreError {
    CoreError::InvalidPath {
        path: path.to_owned(),
        reason: reason.to_owned(),
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StorePath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StorePath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
