pub mod filter;
pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

pub use filter::{Condition, Filter, FilterOp};
pub use memory::MemoryRecordStore;
pub use pg::PgRecordStore;

/// A stored record is a flat JSON object keyed by field name.
pub type Record = Map<String, Value>;

/// Collections this deployment knows about. The Postgres store refuses
/// anything else so collection names can be spliced into SQL identifiers.
pub const KNOWN_COLLECTIONS: &[&str] = &[
    "clientes",
    "contratos",
    "produtos",
    "alunos",
    "usuario_clientes",
    "audit_events",
];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: String, id: String },
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("record serialization error: {0}")]
    Serialization(String),
}

/// Narrow interface over the relational store.
///
/// The authorization layer never sees a concrete client shape; deployments
/// run the Postgres implementation, tests run the in-memory one.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Record>, StoreError>;
    async fn list(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StoreError>;
    async fn create(&self, collection: &str, record: Record) -> Result<Record, StoreError>;
    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        patch: Record,
    ) -> Result<Record, StoreError>;
    /// Removes the record and returns its last state.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<Record, StoreError>;
    async fn count(&self, collection: &str, filter: &Filter) -> Result<i64, StoreError>;
}

/// Stamp a new record with an id and creation timestamps. Shared by every
/// store implementation so records look the same regardless of backend.
pub(crate) fn prepare_new(mut record: Record) -> (Uuid, Record) {
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let now = Utc::now().to_rfc3339();
    record.insert("id".to_string(), Value::String(id.to_string()));
    record.insert("created_at".to_string(), Value::String(now.clone()));
    record.insert("updated_at".to_string(), Value::String(now));
    (id, record)
}

pub(crate) fn stamp_updated(record: &mut Record) {
    record.insert(
        "updated_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
}
