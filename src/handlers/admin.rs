use axum::{extract::State, response::Response, Extension};
use serde_json::{json, Value};

use crate::api::envelope;
use crate::middleware::{RequestContext, RequestId};
use crate::models::Tenant;
use crate::rbac::Action;
use crate::state::AppState;
use crate::store::Filter;

/// GET /api/admin/tenants - tenant registry listing.
///
/// Reached either with an admin binding on the header tenant or, when the
/// bypass is enabled, by a flagged global admin with no header at all.
/// Tenant lifecycle stays external; this surface is read-only.
pub async fn tenants(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let store = state.store.clone();
    let result = state
        .executor
        .execute(request_id, &ctx, "clientes", Action::Read, || async move {
            let records = store.list("clientes", &Filter::new()).await?;
            let tenants: Vec<Value> = records
                .iter()
                .filter_map(Tenant::from_record)
                .map(|t| {
                    json!({
                        "id": t.id,
                        "nome": t.nome,
                        "status": t.status.as_str(),
                    })
                })
                .collect();
            Ok(Value::Array(tenants))
        })
        .await;
    envelope::respond(request_id, result)
}

/// GET /api/admin/audit - audit trail listing, scoped to the context tenant
/// when one is present.
pub async fn audit_trail(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let store = state.store.clone();
    let tenant = ctx.tenant_id();
    let result = state
        .executor
        .execute(request_id, &ctx, "audit_events", Action::Read, || async move {
            let filter = match tenant {
                Some(tenant) => Filter::new().eq("tenant_id", tenant.to_string()),
                None => Filter::new(),
            };
            let events = store.list("audit_events", &filter).await?;
            Ok(Value::Array(events.into_iter().map(Value::Object).collect()))
        })
        .await;
    envelope::respond(request_id, result)
}
