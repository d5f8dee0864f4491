//! Key-value storage the router persists into.
//!
//! Records are loose JSON objects grouped into a handful of tables. Each
//! table names the record field(s) that form its key, in the style of an
//! IndexedDB object store: numbers sort before strings and composite keys
//! compare element by element.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A stored record.
pub type Record = serde_json::Map<String, Value>;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    Friends,
    Chat,
    LoggedInUserInfo,
    Preferences,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Friends,
        Table::Chat,
        Table::LoggedInUserInfo,
        Table::Preferences,
    ];

    /// Record fields that make up this table's key.
    pub fn key_path(&self) -> &'static [&'static str] {
        match self {
            Table::Chat => &["key", "timestamp"],
            Table::Friends | Table::LoggedInUserInfo | Table::Preferences => &["key"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Friends => "Friends",
            Table::Chat => "Chat",
            Table::LoggedInUserInfo => "LoggedInUserInfo",
            Table::Preferences => "Preferences",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component of a key. Variant order gives numbers < text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Number(i64),
    Text(String),
}

impl KeyPart {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().and_then(|n| i64::try_from(n).ok()))
                .map(KeyPart::Number),
            Value::String(s) => Some(KeyPart::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Number(n)
    }
}

impl From<u64> for KeyPart {
    fn from(n: u64) -> Self {
        KeyPart::Number(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Text(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub Vec<KeyPart>);

impl Key {
    pub fn single(part: impl Into<KeyPart>) -> Self {
        Key(vec![part.into()])
    }

    pub fn pair(first: impl Into<KeyPart>, second: impl Into<KeyPart>) -> Self {
        Key(vec![first.into(), second.into()])
    }

    /// Pull `table`'s key out of a record.
    pub fn from_record(table: Table, record: &Record) -> Result<Self, StorageError> {
        table
            .key_path()
            .iter()
            .map(|field| {
                let value = record.get(*field).ok_or(StorageError::MissingKey {
                    table,
                    field: field.to_string(),
                })?;
                KeyPart::from_value(value).ok_or(StorageError::InvalidKey {
                    table,
                    field: field.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Key)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::single(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::single(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::single(s)
    }
}

/// Portable dump of every table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub tables: BTreeMap<Table, Vec<Record>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tables: BTreeMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record for {table} is missing key field `{field}`")]
    MissingKey { table: Table, field: String },
    #[error("key field `{field}` of {table} must be a string or an integer")]
    InvalidKey { table: Table, field: String },
    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshot(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    async fn get_all(&self, table: Table) -> Result<Vec<Record>, StorageError>;

    async fn get(&self, table: Table, key: &Key) -> Result<Option<Record>, StorageError>;

    /// Records with `lower <= key <= upper`, in key order.
    async fn get_in_range(
        &self,
        table: Table,
        lower: &Key,
        upper: &Key,
    ) -> Result<Vec<Record>, StorageError>;

    /// Insert `record`, or merge its fields into the record with the same
    /// key. Returns the stored record.
    async fn put(&self, table: Table, record: Record) -> Result<Record, StorageError>;

    async fn export(&self) -> Result<Snapshot, StorageError>;

    /// Replace everything with the snapshot's contents.
    async fn import(&self, snapshot: Snapshot) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numbers_sort_before_text() {
        assert!(Key::from(5i64) < Key::from("a"));
        assert!(Key::pair("abc", 1i64) < Key::pair("abc", 2i64));
        assert!(Key::pair("abc", i64::MAX) < Key::pair("abd", 0i64));
    }

    #[test]
    fn test_key_from_record() {
        let chat = record(json!({"key": "ab", "timestamp": 42, "message": "hi"}));
        assert_eq!(
            Key::from_record(Table::Chat, &chat).unwrap(),
            Key::pair("ab", 42i64)
        );

        let missing = record(json!({"key": "ab"}));
        assert!(matches!(
            Key::from_record(Table::Chat, &missing),
            Err(StorageError::MissingKey { .. })
        ));

        let invalid = record(json!({"key": true}));
        assert!(matches!(
            Key::from_record(Table::Friends, &invalid),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_snapshot_format() {
        let mut snapshot = Snapshot::default();
        snapshot
            .tables
            .insert(Table::Friends, vec![record(json!({"key": "ab"}))]);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            json!({"version": 1, "tables": {"Friends": [{"key": "ab"}]}})
        );
    }
}
