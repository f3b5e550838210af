use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{RoleBinding, Tenant};
use crate::rbac::Role;
use crate::store::{Filter, RecordStore, StoreError};

/// Read-side lookups the tenant context resolver depends on.
///
/// Tenants and role bindings are owned by the record store; this layer only
/// reads them.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, StoreError>;
    async fn find_role_binding(
        &self,
        user_id: &str,
        tenant_id: Uuid,
    ) -> Result<Option<RoleBinding>, StoreError>;
    /// Whether the user holds an admin binding on any tenant at all.
    async fn has_admin_binding(&self, user_id: &str) -> Result<bool, StoreError>;
}

/// Directory view over the record store: the `clientes` collection is the
/// tenant registry, `usuario_clientes` holds the role bindings.
pub struct StoreTenantDirectory {
    store: Arc<dyn RecordStore>,
}

impl StoreTenantDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TenantDirectory for StoreTenantDirectory {
    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let Some(record) = self.store.find("clientes", id).await? else {
            return Ok(None);
        };
        match Tenant::from_record(&record) {
            Some(tenant) => Ok(Some(tenant)),
            None => {
                // A registry row that does not parse is treated as absent;
                // the caller sees the same forbidden answer either way.
                tracing::warn!(tenant_id = %id, "malformed tenant registry record");
                Ok(None)
            }
        }
    }

    async fn find_role_binding(
        &self,
        user_id: &str,
        tenant_id: Uuid,
    ) -> Result<Option<RoleBinding>, StoreError> {
        let filter = Filter::new()
            .eq("user_id", user_id)
            .eq("cliente_id", tenant_id.to_string())
            .limit(1);
        let records = self.store.list("usuario_clientes", &filter).await?;
        Ok(records.first().and_then(RoleBinding::from_record))
    }

    async fn has_admin_binding(&self, user_id: &str) -> Result<bool, StoreError> {
        let filter = Filter::new()
            .eq("user_id", user_id)
            .eq("role", json!(Role::Admin));
        Ok(self.store.count("usuario_clientes", &filter).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use serde_json::Value;

    fn record(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    async fn seeded() -> (StoreTenantDirectory, Uuid) {
        let store = Arc::new(MemoryRecordStore::new());
        let tenant_id = Uuid::new_v4();
        store
            .seed(
                "clientes",
                record(json!({
                    "id": tenant_id.to_string(),
                    "nome": "Academia Norte",
                    "status": "active"
                })),
            )
            .await;
        store
            .seed(
                "usuario_clientes",
                record(json!({
                    "user_id": "user-1",
                    "cliente_id": tenant_id.to_string(),
                    "role": "client"
                })),
            )
            .await;
        (StoreTenantDirectory::new(store), tenant_id)
    }

    #[tokio::test]
    async fn finds_tenant_and_binding() {
        let (directory, tenant_id) = seeded().await;

        let tenant = directory.find_tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.nome, "Academia Norte");

        let binding = directory
            .find_role_binding("user-1", tenant_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(binding.role, Role::Client);

        assert!(directory
            .find_role_binding("user-2", tenant_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn admin_binding_lookup_checks_role() {
        let (directory, _) = seeded().await;
        assert!(!directory.has_admin_binding("user-1").await.unwrap());
        assert!(!directory.has_admin_binding("user-9").await.unwrap());
    }
}
