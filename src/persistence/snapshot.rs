//! On-disk snapshot schema.
//!
//! One JSON document with a section per value family:
//!
//! ```json
//! {
//!   "version": 1,
//!   "strings": [{ "key": "name", "value": "Ariz", "expires_at_ms": null }],
//!   "lists":   [{ "key": "queue", "items": ["a", "b"] }],
//!   "hashes":  [{ "key": "user", "fields": [{ "field": "age", "value": "30" }] }],
//!   "sets":    [{ "key": "tags", "members": ["x", "y"] }]
//! }
//! ```
//!
//! Byte strings are written as JSON strings when they are valid UTF-8 and as
//! arrays of byte values otherwise. Expiry deadlines live on the scalar record
//! they belong to, as Unix milliseconds.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Schema version written to every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A byte string as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Blob {
    Text(String),
    Binary(Vec<u8>),
}

impl From<&Bytes> for Blob {
    fn from(bytes: &Bytes) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Blob::Text(text.to_owned()),
            Err(_) => Blob::Binary(bytes.to_vec()),
        }
    }
}

impl From<Blob> for Bytes {
    fn from(blob: Blob) -> Self {
        match blob {
            Blob::Text(text) => Bytes::from(text),
            Blob::Binary(raw) => Bytes::from(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarRecord {
    pub key: Blob,
    pub value: Blob,
    /// Absolute deadline, milliseconds since the Unix epoch
    #[serde(default)]
    pub expires_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRecord {
    pub key: Blob,
    pub items: Vec<Blob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRecord {
    pub field: Blob,
    pub value: Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashRecord {
    pub key: Blob,
    pub fields: Vec<FieldRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRecord {
    pub key: Blob,
    pub members: Vec<Blob>,
}

/// Full contents of a store at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub strings: Vec<ScalarRecord>,
    #[serde(default)]
    pub lists: Vec<ListRecord>,
    #[serde(default)]
    pub hashes: Vec<HashRecord>,
    #[serde(default)]
    pub sets: Vec<SetRecord>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            strings: Vec::new(),
            lists: Vec::new(),
            hashes: Vec::new(),
            sets: Vec::new(),
        }
    }
}

impl Snapshot {
    /// Number of keys across all sections.
    pub fn key_count(&self) -> usize {
        self.strings.len() + self.lists.len() + self.hashes.len() + self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }
}
