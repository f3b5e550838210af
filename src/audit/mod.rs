use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::rbac::Action;
use crate::store::{RecordStore, StoreError};

/// Append-only record of one mutating call. Emitted by the operation
/// executor whether the call succeeded or failed; never read back on the
/// request path.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub request_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub user_id: String,
    pub action: Action,
    pub entity: String,
    pub entity_id: Option<String>,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError>;
}

/// Writes audit events into the `audit_events` collection.
pub struct StoreAuditSink {
    store: Arc<dyn RecordStore>,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError> {
        let value = serde_json::to_value(&event)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let Value::Object(record) = value else {
            return Err(StoreError::Serialization(
                "audit event did not serialize to an object".into(),
            ));
        };
        self.store.create("audit_events", record).await?;
        Ok(())
    }
}
