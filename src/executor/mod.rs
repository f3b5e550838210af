use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::ApiError;
use crate::middleware::tenant::RequestContext;
use crate::rbac::{Action, PermissionMatrix};
use crate::store::{Record, StoreError};

/// Payload field that carries the tenant scope on stored records.
pub const TENANT_FIELD: &str = "cliente_id";

/// The single choke point for business operations.
///
/// Every handler call goes through here: permission gate first, then the
/// tenant-scope guard on write payloads, then the timed operation itself
/// with structured logging and, for mutations, an audit event. No handler
/// writes to the record store any other way.
pub struct OperationExecutor {
    matrix: Arc<PermissionMatrix>,
    audit: Arc<dyn AuditSink>,
}

impl OperationExecutor {
    pub fn new(matrix: Arc<PermissionMatrix>, audit: Arc<dyn AuditSink>) -> Self {
        Self { matrix, audit }
    }

    /// Read path: permission check, timed execution, structured logs.
    pub async fn execute<T, F, Fut>(
        &self,
        request_id: Uuid,
        ctx: &RequestContext,
        resource: &str,
        action: Action,
        op: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.matrix.validate_permission(ctx, resource, action)?;

        let started = Instant::now();
        let result = op().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                tracing::info!(
                    %request_id,
                    resource,
                    action = action.as_str(),
                    user_id = ctx.user_id(),
                    status = 200,
                    latency_ms,
                    "operation completed"
                );
                Ok(value)
            }
            Err(err) => {
                let api = reduce_operation_error(err);
                tracing::error!(
                    %request_id,
                    resource,
                    action = action.as_str(),
                    user_id = ctx.user_id(),
                    code = api.error_code(),
                    latency_ms,
                    "operation failed"
                );
                Err(api)
            }
        }
    }

    /// Write path: additionally guards the payload's tenant field and emits
    /// an audit event for the mutation, success or failure.
    ///
    /// `op` receives the guarded payload and returns the affected record;
    /// the executor takes the entity id and before/after image from it.
    pub async fn execute_write<F, Fut>(
        &self,
        request_id: Uuid,
        ctx: &RequestContext,
        resource: &str,
        action: Action,
        scope_field: &str,
        payload: Option<Record>,
        op: F,
    ) -> Result<Value, ApiError>
    where
        F: FnOnce(Option<Record>) -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        self.matrix.validate_permission(ctx, resource, action)?;

        let payload = match payload {
            Some(mut payload) => {
                if scope_field == TENANT_FIELD {
                    self.guard_tenant_field(ctx, resource, action, &mut payload)?;
                }
                Some(payload)
            }
            None => None,
        };

        let payload_entity_id = payload
            .as_ref()
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let started = Instant::now();
        let result = op(payload).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(record) => {
                tracing::info!(
                    %request_id,
                    resource,
                    action = action.as_str(),
                    user_id = ctx.user_id(),
                    status = 200,
                    latency_ms,
                    "operation completed"
                );
                let entity_id = record
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or(payload_entity_id);
                let details = match action {
                    Action::Delete => json!({ "before": record }),
                    _ => json!({ "after": record }),
                };
                self.emit_audit(request_id, ctx, resource, action, entity_id, details)
                    .await;
                Ok(record)
            }
            Err(err) => {
                let api = reduce_operation_error(err);
                tracing::error!(
                    %request_id,
                    resource,
                    action = action.as_str(),
                    user_id = ctx.user_id(),
                    code = api.error_code(),
                    latency_ms,
                    "operation failed"
                );
                let details = json!({ "outcome": "error", "code": api.error_code() });
                self.emit_audit(request_id, ctx, resource, action, payload_entity_id, details)
                    .await;
                Err(api)
            }
        }
    }

    /// Caller-supplied tenant ids are never trusted. A mismatch is rejected
    /// before the operation runs; an absent field on create is filled from
    /// the context so storage is always correctly scoped.
    fn guard_tenant_field(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: Action,
        payload: &mut Record,
    ) -> Result<(), ApiError> {
        match payload.get(TENANT_FIELD) {
            Some(supplied) => {
                let supplied_id = supplied
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok());

                match (ctx.tenant_id(), supplied_id) {
                    (Some(scope), Some(supplied_id)) if supplied_id == scope => Ok(()),
                    (Some(scope), _) => {
                        // Possible tampering, not a routine shape problem.
                        tracing::warn!(
                            security = true,
                            user_id = ctx.user_id(),
                            tenant_id = %scope,
                            resource,
                            action = action.as_str(),
                            supplied = %supplied,
                            "request payload attempted to override the tenant scope"
                        );
                        let mut field_errors = HashMap::new();
                        field_errors.insert(
                            TENANT_FIELD.to_string(),
                            "this field is fixed by the tenant context".to_string(),
                        );
                        Err(ApiError::validation_fields(
                            "cliente_id cannot be set by the caller",
                            field_errors,
                        ))
                    }
                    // Header-less admin context: an explicit, well-formed
                    // target tenant is the only way to scope the write.
                    (None, Some(_)) => Ok(()),
                    (None, None) => Err(ApiError::validation(
                        "cliente_id must be a valid UUID",
                    )),
                }
            }
            None => {
                if action == Action::Create {
                    match ctx.tenant_id() {
                        Some(scope) => {
                            payload.insert(
                                TENANT_FIELD.to_string(),
                                Value::String(scope.to_string()),
                            );
                            Ok(())
                        }
                        None => Err(ApiError::validation(
                            "cliente_id is required for tenant-less admin writes",
                        )),
                    }
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Best effort: a failed audit write is a warning, never an operation
    /// failure.
    async fn emit_audit(
        &self,
        request_id: Uuid,
        ctx: &RequestContext,
        resource: &str,
        action: Action,
        entity_id: Option<String>,
        details: Value,
    ) {
        let event = AuditEvent {
            request_id,
            tenant_id: ctx.tenant_id(),
            user_id: ctx.user_id().to_string(),
            action,
            entity: resource.to_string(),
            entity_id,
            details,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.audit.record(event).await {
            tracing::warn!(
                %request_id,
                resource,
                action = action.as_str(),
                "audit event write failed: {}",
                err
            );
        }
    }
}

/// Only the executor converts arbitrary operation errors into the wire
/// shape. Typed API errors pass through with their own mapping; anything
/// else is logged in full server-side and reduced to the opaque internal
/// error.
fn reduce_operation_error(err: anyhow::Error) -> ApiError {
    match err.downcast::<ApiError>() {
        Ok(api) => api,
        Err(err) => match err.downcast::<StoreError>() {
            Ok(store_err) => ApiError::from(store_err),
            Err(other) => {
                tracing::error!("unhandled operation error: {:#}", other);
                ApiError::InternalError
            }
        },
    }
}
