//! Account id validation and 15/18-character equivalence
//!
//! Directory ids exist in a case-sensitive 15-character form and an
//! 18-character form that appends a case checksum. Both spell the same
//! account, so comparisons use the canonical 18-character form while the
//! caller's spelling is kept for output.

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::MatchError;

const CHECKSUM_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ012345";

/// A validated account id
#[derive(Debug, Clone)]
pub struct AccountId {
    raw: String,
    canonical: String,
}

impl AccountId {
    /// Validate an id: 15 or 18 ASCII alphanumerics starting with `prefix`
    ///
    /// An empty `prefix` disables the prefix check.
    pub fn parse(raw: &str, prefix: &str) -> Result<Self, MatchError> {
        let trimmed = raw.trim();

        if trimmed.len() != 15 && trimmed.len() != 18 {
            return Err(MatchError::Validation(raw.to_string()));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(MatchError::Validation(raw.to_string()));
        }
        if !prefix.is_empty() && !trimmed.starts_with(prefix) {
            return Err(MatchError::Validation(raw.to_string()));
        }

        let base = &trimmed[..15];
        let canonical = format!("{}{}", base, checksum_suffix(base));

        Ok(Self {
            raw: trimmed.to_string(),
            canonical,
        })
    }

    /// Id as supplied by the caller (trimmed)
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical 18-character form
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

/// Case checksum of a 15-character id
fn checksum_suffix(base: &str) -> String {
    base.as_bytes()
        .chunks(5)
        .map(|chunk| {
            let flags = chunk
                .iter()
                .enumerate()
                .filter(|(_, b)| b.is_ascii_uppercase())
                .fold(0usize, |acc, (j, _)| acc | (1 << j));
            CHECKSUM_ALPHABET[flags] as char
        })
        .collect()
}

impl PartialEq for AccountId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for AccountId {}

impl Hash for AccountId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for AccountId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccountId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
