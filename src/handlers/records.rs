use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, Uri},
    response::Response,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{collection, Collection};
use crate::api::envelope;
use crate::error::ApiError;
use crate::middleware::{RequestContext, RequestId};
use crate::models;
use crate::rbac::Action;
use crate::state::AppState;
use crate::store::{Filter, Record};

/// GET /api/:collection - tenant-scoped listing
pub async fn list(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    Path(name): Path<String>,
) -> Response {
    let Some(col) = collection(&name) else {
        return unknown_route(request_id, &method, uri.path());
    };

    let store = state.store.clone();
    let filter = scope_filter(col, ctx.tenant_id());
    let result = state
        .executor
        .execute(request_id, &ctx, col.name, Action::Read, || async move {
            let records = store.list(col.name, &filter).await?;
            Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
        })
        .await;
    envelope::respond(request_id, result)
}

/// GET /api/:collection/:id - tenant-scoped fetch
pub async fn get(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    Path((name, id)): Path<(String, String)>,
) -> Response {
    let Some(col) = collection(&name) else {
        return unknown_route(request_id, &method, uri.path());
    };
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(err) => return envelope::failure(request_id, &err),
    };

    let store = state.store.clone();
    let tenant = ctx.tenant_id();
    let result = state
        .executor
        .execute(request_id, &ctx, col.name, Action::Read, || async move {
            // Scope is applied before existence is revealed: a record from
            // another tenant answers exactly like a missing one.
            let record = store
                .find(col.name, id)
                .await?
                .filter(|r| in_scope(col, r, tenant))
                .ok_or_else(|| not_found(col, id))?;
            Ok(Value::Object(record))
        })
        .await;
    envelope::respond(request_id, result)
}

/// POST /api/:collection - validated create through the write path
pub async fn create(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(col) = collection(&name) else {
        return unknown_route(request_id, &method, uri.path());
    };
    let payload = match parse_object(body) {
        Ok(payload) => payload,
        Err(err) => return envelope::failure(request_id, &err),
    };
    if let Err(err) =
        models::reject_system_fields(&payload).and_then(|_| models::validate_create(col.name, &payload))
    {
        return envelope::failure(request_id, &err);
    }

    let store = state.store.clone();
    let result = state
        .executor
        .execute_write(
            request_id,
            &ctx,
            col.name,
            Action::Create,
            col.scope_field,
            Some(payload),
            |guarded| async move {
                let guarded = guarded.unwrap_or_default();
                let record = store.create(col.name, guarded).await?;
                Ok(Value::Object(record))
            },
        )
        .await;
    envelope::respond(request_id, result)
}

/// PUT /api/:collection/:id - patch-style update through the write path
pub async fn update(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    Path((name, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(col) = collection(&name) else {
        return unknown_route(request_id, &method, uri.path());
    };
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(err) => return envelope::failure(request_id, &err),
    };
    let payload = match parse_object(body) {
        Ok(payload) => payload,
        Err(err) => return envelope::failure(request_id, &err),
    };
    if let Err(err) = models::reject_system_fields(&payload) {
        return envelope::failure(request_id, &err);
    }

    let store = state.store.clone();
    let tenant = ctx.tenant_id();
    let result = state
        .executor
        .execute_write(
            request_id,
            &ctx,
            col.name,
            Action::Update,
            col.scope_field,
            Some(payload),
            |guarded| async move {
                store
                    .find(col.name, id)
                    .await?
                    .filter(|r| in_scope(col, r, tenant))
                    .ok_or_else(|| not_found(col, id))?;
                let record = store.update(col.name, id, guarded.unwrap_or_default()).await?;
                Ok(Value::Object(record))
            },
        )
        .await;
    envelope::respond(request_id, result)
}

/// DELETE /api/:collection/:id
pub async fn remove(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    Path((name, id)): Path<(String, String)>,
) -> Response {
    let Some(col) = collection(&name) else {
        return unknown_route(request_id, &method, uri.path());
    };
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(err) => return envelope::failure(request_id, &err),
    };

    let store = state.store.clone();
    let tenant = ctx.tenant_id();
    let result = state
        .executor
        .execute_write(
            request_id,
            &ctx,
            col.name,
            Action::Delete,
            col.scope_field,
            None,
            |_| async move {
                store
                    .find(col.name, id)
                    .await?
                    .filter(|r| in_scope(col, r, tenant))
                    .ok_or_else(|| not_found(col, id))?;
                let removed = store.delete(col.name, id).await?;
                Ok(Value::Object(removed))
            },
        )
        .await;
    envelope::respond(request_id, result)
}

pub(super) fn scope_filter(col: &Collection, tenant: Option<Uuid>) -> Filter {
    match tenant {
        Some(tenant) => Filter::new().eq(col.scope_field, tenant.to_string()),
        // Only the header-less global-admin path gets an unscoped view.
        None => Filter::new(),
    }
}

pub(super) fn in_scope(col: &Collection, record: &Record, tenant: Option<Uuid>) -> bool {
    let Some(tenant) = tenant else {
        return true;
    };
    record
        .get(col.scope_field)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        == Some(tenant)
}

fn not_found(col: &Collection, id: Uuid) -> ApiError {
    ApiError::not_found(format!("{} {} not found", col.name, id))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation("record id must be a valid UUID"))
}

fn parse_object(body: Result<Json<Value>, JsonRejection>) -> Result<Record, ApiError> {
    let Json(value) = body.map_err(|e| ApiError::validation(format!("invalid JSON body: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::validation("request body must be a JSON object")),
    }
}

/// A path under /api/ that names no known collection is a routing miss, and
/// safe to echo.
pub(super) fn unknown_route(request_id: Uuid, method: &Method, path: &str) -> Response {
    envelope::failure(
        request_id,
        &ApiError::NotFound {
            message: "route not found".to_string(),
            details: Some(json!({ "method": method.as_str(), "path": path })),
        },
    )
}
