use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{prepare_new, stamp_updated, Filter, Record, RecordStore, StoreError};

/// In-memory record store.
///
/// Backs the test suite and local development runs; collections are created
/// lazily on first write.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, HashMap<Uuid, Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the API surface. Test setup only.
    pub async fn seed(&self, collection: &str, record: Record) -> Record {
        let (id, record) = prepare_new(record);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, record.clone());
        record
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(&id))
            .cloned())
    }

    async fn list(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().await;
        let mut records: Vec<Record> = collections
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Stable output order for callers and tests
        records.sort_by(|a, b| {
            let ka = a.get("created_at").and_then(Value::as_str).unwrap_or("");
            let kb = b.get("created_at").and_then(Value::as_str).unwrap_or("");
            ka.cmp(kb).then_with(|| {
                let ia = a.get("id").and_then(Value::as_str).unwrap_or("");
                let ib = b.get("id").and_then(Value::as_str).unwrap_or("");
                ia.cmp(ib)
            })
        });

        if let Some(offset) = filter.offset {
            records = records.into_iter().skip(offset.max(0) as usize).collect();
        }
        if let Some(limit) = filter.limit {
            records.truncate(limit.max(0) as usize);
        }
        Ok(records)
    }

    async fn create(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let (id, record) = prepare_new(record);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        patch: Record,
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let record = records.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        for (k, v) in patch {
            record.insert(k, v);
        }
        stamp_updated(record);
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|records| records.remove(&id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<i64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| records.values().filter(|r| filter.matches(r)).count() as i64)
            .unwrap_or(0))
    }
}
