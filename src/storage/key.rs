//! Storage key construction
//!
//! Keys are always `<folder>/<name>`. Both segments are trimmed of
//! whitespace and `/` at their ends so that joining never produces a
//! doubled or dangling separator.

use std::fmt;

use uuid::Uuid;

use crate::types::{AppError, AppResult};

pub const KEY_SEPARATOR: char = '/';

/// A normalized object key. Never empty, never starts or ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

fn trim_segment(segment: &str) -> &str {
    segment.trim_matches(|c: char| c.is_whitespace() || c == KEY_SEPARATOR)
}

impl StorageKey {
    /// Build a key from a folder and an optional name.
    ///
    /// When `name` is `None` a random UUID v4 is used, so concurrent
    /// writers into the same folder never collide.
    pub fn build(folder: &str, name: Option<&str>) -> AppResult<Self> {
        let folder = trim_segment(folder);
        if folder.is_empty() {
            return Err(AppError::InvalidKeyInput("folder is empty".to_string()));
        }

        let generated;
        let name = match name {
            Some(name) => trim_segment(name),
            None => {
                generated = Uuid::new_v4().to_string();
                generated.as_str()
            }
        };
        if name.is_empty() {
            return Err(AppError::InvalidKeyInput("name is empty".to_string()));
        }

        Ok(Self(format!("{folder}{KEY_SEPARATOR}{name}")))
    }

    /// Build a key under `folder` with a generated unique name.
    pub fn generate(folder: &str) -> AppResult<Self> {
        Self::build(folder, None)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
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
