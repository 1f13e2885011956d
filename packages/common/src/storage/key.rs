use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;

const MAX_KEY_LEN: usize = 1024;

/// Longest file name, in bytes, that [`StorageKey::for_asset`] accepts for any
/// pair of ids. The asset prefix takes at most 98 bytes:
/// `users/` + 20 + `/notes/` + 20 + `/assets/` + 36 + `_`.
pub const MAX_ASSET_FILE_NAME_BYTES: usize = 900;

/// A validated object key: `/`-separated relative segments, no traversal,
/// no backslashes and no control characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Key for a freshly announced asset upload:
    /// `users/{user_id}/notes/{note_id}/assets/{uuid}_{file_name}`.
    pub fn for_asset(user_id: i64, note_id: i64, file_name: &str) -> Result<Self, StorageError> {
        if file_name.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "file name '{file_name}' contains a path separator"
            )));
        }
        Self::parse(format!(
            "users/{user_id}/notes/{note_id}/assets/{}_{file_name}",
            Uuid::new_v4()
        ))
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, StorageError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(StorageError::InvalidKey("key is empty".into()));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key exceeds {MAX_KEY_LEN} bytes"
            )));
        }
        if raw.starts_with('/') {
            return Err(StorageError::InvalidKey(format!("'{raw}' is absolute")));
        }
        if raw.contains('\\') || raw.chars().any(|c| c.is_control()) {
            return Err(StorageError::InvalidKey(format!(
                "'{}' contains forbidden characters",
                raw.escape_debug()
            )));
        }
        if raw
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(StorageError::InvalidKey(format!(
                "'{raw}' contains an empty or relative segment"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StorageKey {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}
