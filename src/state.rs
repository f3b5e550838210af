use std::sync::Arc;

use crate::audit::StoreAuditSink;
use crate::auth::IdentityProvider;
use crate::config::AppConfig;
use crate::executor::OperationExecutor;
use crate::middleware::TenantResolver;
use crate::rbac::PermissionMatrix;
use crate::services::StoreTenantDirectory;
use crate::store::RecordStore;

/// Shared, immutable application state. Built once in `main` (or the test
/// harness) and cloned into every request; nothing here mutates after
/// startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub resolver: Arc<TenantResolver>,
    pub matrix: Arc<PermissionMatrix>,
    pub executor: Arc<OperationExecutor>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let directory = Arc::new(StoreTenantDirectory::new(store.clone()));
        let matrix = Arc::new(PermissionMatrix::with_default_rules());
        let audit = Arc::new(StoreAuditSink::new(store.clone()));
        let resolver = Arc::new(TenantResolver::new(directory, &config.security));
        let executor = Arc::new(OperationExecutor::new(matrix.clone(), audit));

        Self {
            config,
            store,
            identity,
            resolver,
            matrix,
            executor,
        }
    }
}
