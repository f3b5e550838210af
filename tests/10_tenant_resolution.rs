mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn request_without_credential_is_unauthorized() {
    let h = harness().await;
    let (status, body) = send(&h.app, Method::GET, "/api/contratos", None, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/api/contratos",
        Some("tok-forged"),
        Some(&h.tenant_a.to_string()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn missing_tenant_header_is_required() {
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/api/contratos",
        Some(TOK_CLIENT_A),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);
    assert_eq!(error_code(&body), "TENANT_HEADER_REQUIRED");
}

#[tokio::test]
async fn malformed_tenant_header_is_invalid() {
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/api/contratos",
        Some(TOK_CLIENT_A),
        Some("not-a-uuid"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "TENANT_HEADER_INVALID");
}

#[tokio::test]
async fn cross_tenant_header_is_forbidden() {
    // Bound only to tenant A; header names tenant B (valid UUID, active).
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/api/contratos",
        Some(TOK_CLIENT_A),
        Some(&h.tenant_b.to_string()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "TENANT_FORBIDDEN");
}

#[tokio::test]
async fn unknown_tenant_answers_like_cross_tenant() {
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/api/contratos",
        Some(TOK_CLIENT_A),
        Some(&uuid::Uuid::new_v4().to_string()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "TENANT_FORBIDDEN");
    // Anti-enumeration: no detail distinguishes the two cases
    assert!(body["error"].get("details").is_none());
}

#[tokio::test]
async fn suspended_tenant_is_opaque() {
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/api/contratos",
        Some(TOK_CLIENT_A),
        Some(&h.tenant_suspended.to_string()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "TENANT_FORBIDDEN");
}

#[tokio::test]
async fn body_tenant_id_cannot_substitute_for_the_header() {
    // Tenant scoping comes from the header, never from request-body data.
    let h = harness().await;
    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/contratos",
        Some(TOK_CLIENT_A),
        None,
        Some(json!({
            "cliente_id": h.tenant_a.to_string(),
            "descricao": "plano",
            "valor": "10.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "TENANT_HEADER_REQUIRED");
}
