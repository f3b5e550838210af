use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Map, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use gestor_api::auth::{Principal, StaticIdentityProvider};
use gestor_api::config::{AppConfig, Environment, SecurityConfig, ServerConfig, StoreConfig};
use gestor_api::routes;
use gestor_api::state::AppState;
use gestor_api::store::{MemoryRecordStore, RecordStore};

pub const TOK_ADMIN_A: &str = "tok-admin-a";
pub const TOK_CLIENT_A: &str = "tok-client-a";
pub const TOK_STUDENT_A: &str = "tok-student-a";
pub const TOK_CLIENT_B: &str = "tok-client-b";
pub const TOK_ROOT: &str = "tok-root";

pub struct Harness {
    pub app: Router,
    pub store: Arc<MemoryRecordStore>,
    pub tenant_a: Uuid,
    pub tenant_b: Uuid,
    pub tenant_suspended: Uuid,
    pub contrato_a: Uuid,
    pub contrato_b: Uuid,
}

fn test_config(admin_bypass: bool) -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        server: ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            enable_cors: true,
        },
        security: SecurityConfig {
            tenant_header: "x-cliente-id".to_string(),
            admin_bypass,
            introspection_url: String::new(),
            introspection_timeout_secs: 1,
        },
        store: StoreConfig {
            database_url: None,
            max_connections: 1,
            in_memory: true,
        },
    }
}

fn principal(id: &str, global_admin: bool) -> Principal {
    Principal {
        id: id.to_string(),
        is_global_admin: global_admin,
        claims: Map::new(),
    }
}

fn record(v: Value) -> Map<String, Value> {
    v.as_object().unwrap().clone()
}

/// Build the full router over a seeded in-memory store and a static identity
/// provider: three tenants, one user per role on tenant A, a client on
/// tenant B, and a flagged global admin with no bindings at all.
pub async fn harness_with(admin_bypass: bool) -> Harness {
    let store = Arc::new(MemoryRecordStore::new());
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let tenant_suspended = Uuid::new_v4();

    for (id, nome, status) in [
        (tenant_a, "Academia Norte", "active"),
        (tenant_b, "Academia Sul", "active"),
        (tenant_suspended, "Academia Leste", "suspended"),
    ] {
        store
            .seed(
                "clientes",
                record(json!({ "id": id.to_string(), "nome": nome, "status": status })),
            )
            .await;
    }

    for (user, tenant, role) in [
        ("user-admin-a", tenant_a, "admin"),
        ("user-client-a", tenant_a, "client"),
        ("user-student-a", tenant_a, "student"),
        ("user-client-b", tenant_b, "client"),
    ] {
        store
            .seed(
                "usuario_clientes",
                record(json!({
                    "user_id": user,
                    "cliente_id": tenant.to_string(),
                    "role": role
                })),
            )
            .await;
    }

    let contrato_a = Uuid::new_v4();
    let contrato_b = Uuid::new_v4();
    store
        .seed(
            "contratos",
            record(json!({
                "id": contrato_a.to_string(),
                "cliente_id": tenant_a.to_string(),
                "descricao": "plano mensal",
                "valor": "1500.00"
            })),
        )
        .await;
    store
        .seed(
            "contratos",
            record(json!({
                "id": contrato_b.to_string(),
                "cliente_id": tenant_b.to_string(),
                "descricao": "plano anual",
                "valor": "9000.00"
            })),
        )
        .await;
    store
        .seed(
            "alunos",
            record(json!({
                "cliente_id": tenant_a.to_string(),
                "nome": "Ana Souza"
            })),
        )
        .await;

    let identity = StaticIdentityProvider::new()
        .with_token(TOK_ADMIN_A, principal("user-admin-a", false))
        .with_token(TOK_CLIENT_A, principal("user-client-a", false))
        .with_token(TOK_STUDENT_A, principal("user-student-a", false))
        .with_token(TOK_CLIENT_B, principal("user-client-b", false))
        .with_token(TOK_ROOT, principal("user-root", true));

    let store_iface: Arc<dyn RecordStore> = store.clone();
    let state = AppState::new(
        Arc::new(test_config(admin_bypass)),
        store_iface,
        Arc::new(identity),
    );

    Harness {
        app: routes::app(state),
        store,
        tenant_a,
        tenant_b,
        tenant_suspended,
        contrato_a,
        contrato_b,
    }
}

pub async fn harness() -> Harness {
    harness_with(true).await
}

/// Fire one request through the in-process router and decode the envelope.
pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    tenant: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(tenant) = tenant {
        builder = builder.header("x-cliente-id", tenant);
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Every envelope carries exactly one of data/error plus the meta block.
pub fn assert_envelope(body: &Value) {
    let has_data = body.get("data").is_some();
    let has_error = body.get("error").is_some();
    assert!(
        has_data ^ has_error,
        "expected exactly one of data/error: {}",
        body
    );
    let meta = body.get("meta").expect("meta block");
    let request_id = meta.get("request_id").and_then(Value::as_str).unwrap();
    assert!(Uuid::parse_str(request_id).is_ok());
    let timestamp = meta.get("timestamp").and_then(Value::as_str).unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

pub fn error_code(body: &Value) -> &str {
    body.get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .unwrap_or("")
}
