use axum::{
    extract::Request,
    http::{Method, Uri},
    middleware,
    response::Response,
    routing::get,
    Extension, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::api::envelope;
use crate::handlers::{admin, dashboard, records};
use crate::middleware::{
    identity_middleware, request_id_middleware, tenant_context_middleware, RequestId,
};
use crate::state::AppState;

/// Path prefixes that require admin-level tenant resolution regardless of
/// HTTP method.
const ADMIN_ROUTE_PREFIXES: &[&str] = &["/api/admin"];

/// Administrative collections: every mutating verb on them requires admin.
/// Other collections leave mutations to the permission matrix.
const ADMIN_COLLECTION_PREFIXES: &[&str] = &["/api/clientes"];

/// Decide, purely from (method, path), whether this route needs admin-level
/// tenant resolution. Runs before the tenant resolver so it can pick the
/// right bypass/role branch.
pub fn requires_admin(method: &Method, path: &str) -> bool {
    if ADMIN_ROUTE_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    if matches!(*method, Method::POST | Method::PUT | Method::DELETE) {
        return ADMIN_COLLECTION_PREFIXES.iter().any(|p| path.starts_with(p));
    }
    false
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/dashboard", get(dashboard::summary))
        .route("/api/admin/tenants", get(admin::tenants))
        .route("/api/admin/audit", get(admin::audit_trail))
        .route(
            "/api/:collection",
            get(records::list).post(records::create),
        )
        .route(
            "/api/:collection/:id",
            get(records::get)
                .put(records::update)
                .delete(records::remove),
        )
        // Innermost first: identity runs before tenant resolution
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_context_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(Extension(RequestId(request_id)): Extension<RequestId>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    envelope::success(
        request_id,
        json!({
            "name": "Gestor API",
            "version": version,
            "description": "Multi-tenant business management API",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "collections": "/api/{clientes,contratos,produtos,alunos}[/:id] (tenant header required)",
                "dashboard": "/api/dashboard (tenant header required)",
                "admin": "/api/admin/* (admin role required)",
            }
        }),
    )
}

async fn health(Extension(RequestId(request_id)): Extension<RequestId>) -> Response {
    envelope::success(request_id, json!({ "status": "ok" }))
}

/// Unmatched routes: the method/path echo is about routing, not data, and is
/// safe to expose.
async fn not_found(request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0)
        .unwrap_or_else(Uuid::new_v4);
    let method: &Method = request.method();
    let uri: &Uri = request.uri();
    envelope::failure(
        request_id,
        &crate::error::ApiError::NotFound {
            message: "route not found".to_string(),
            details: Some(json!({ "method": method.as_str(), "path": uri.path() })),
        },
    )
}
