use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Key, Record, Snapshot, Storage, StorageError, Table, SNAPSHOT_VERSION};

type Tables = BTreeMap<Table, BTreeMap<Key, Record>>;

/// In-process storage. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StorageError> {
        let store = Self::new();
        store.replace(snapshot)?;
        Ok(store)
    }

    pub(crate) fn merge(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        let key = Key::from_record(table, &record)?;
        let mut tables = self.tables.write();
        let stored = tables.entry(table).or_default().entry(key).or_default();
        stored.extend(record);
        Ok(stored.clone())
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read();
        Snapshot {
            version: SNAPSHOT_VERSION,
            tables: tables
                .iter()
                .map(|(table, records)| (*table, records.values().cloned().collect()))
                .collect(),
        }
    }

    pub(crate) fn replace(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedSnapshot(snapshot.version));
        }

        // build first so a bad record leaves the store untouched
        let mut next = Tables::new();
        for (table, records) in snapshot.tables {
            let rows = next.entry(table).or_default();
            for record in records {
                rows.insert(Key::from_record(table, &record)?, record);
            }
        }
        *self.tables.write() = next;
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_all(&self, table: Table) -> Result<Vec<Record>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, table: Table, key: &Key) -> Result<Option<Record>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(&table)
            .and_then(|rows| rows.get(key).cloned()))
    }

    async fn get_in_range(
        &self,
        table: Table,
        lower: &Key,
        upper: &Key,
    ) -> Result<Vec<Record>, StorageError> {
        if lower > upper {
            return Ok(Vec::new());
        }
        Ok(self
            .tables
            .read()
            .get(&table)
            .map(|rows| {
                rows.range(lower.clone()..=upper.clone())
                    .map(|(_, record)| record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        self.merge(table, record)
    }

    async fn export(&self) -> Result<Snapshot, StorageError> {
        Ok(self.snapshot())
    }

    async fn import(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        self.replace(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_put_merges_fields() {
        let store = MemoryStore::new();
        store
            .put(Table::Friends, record(json!({"key": "ab", "name": "bob"})))
            .await
            .unwrap();
        let merged = store
            .put(Table::Friends, record(json!({"key": "ab", "isRead": false})))
            .await
            .unwrap();

        assert_eq!(merged, record(json!({"key": "ab", "name": "bob", "isRead": false})));
        assert_eq!(store.get_all(Table::Friends).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_in_range() {
        let store = MemoryStore::new();
        for (peer, ts) in [("aa", 1), ("aa", 5), ("aa", 9), ("bb", 3)] {
            store
                .put(Table::Chat, record(json!({"key": peer, "timestamp": ts})))
                .await
                .unwrap();
        }

        let rows = store
            .get_in_range(Table::Chat, &Key::pair("aa", 0i64), &Key::pair("aa", 5i64))
            .await
            .unwrap();
        let stamps: Vec<_> = rows.iter().map(|r| r["timestamp"].as_i64().unwrap()).collect();
        assert_eq!(stamps, vec![1, 5]);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_snapshot_atomically() {
        let store = MemoryStore::new();
        store
            .put(Table::Friends, record(json!({"key": "ab"})))
            .await
            .unwrap();

        let mut snapshot = Snapshot::default();
        snapshot.tables.insert(
            Table::Friends,
            vec![record(json!({"key": "cd"})), record(json!({"name": "no key"}))],
        );
        assert!(store.import(snapshot).await.is_err());
        assert!(store.get(Table::Friends, &Key::from("ab")).await.unwrap().is_some());

        let wrong_version = Snapshot {
            version: 7,
            ..Default::default()
        };
        assert!(matches!(
            store.import(wrong_version).await,
            Err(StorageError::UnsupportedSnapshot(7))
        ));
    }
}
