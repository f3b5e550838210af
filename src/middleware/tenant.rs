use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use super::request_id::RequestId;
use crate::api::envelope;
use crate::auth::Principal;
use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::rbac::Role;
use crate::routes;
use crate::services::TenantDirectory;
use crate::state::AppState;

/// Authorization context for one request.
///
/// Constructed exactly once by the resolver and immutable afterwards: the
/// tenant id and role can never be overwritten from request-body data. The
/// tenant id is `None` only on the header-less global-admin path.
#[derive(Clone, Debug)]
pub struct RequestContext {
    tenant_id: Option<Uuid>,
    user_id: String,
    role: Role,
    principal: Principal,
}

impl RequestContext {
    pub(crate) fn new(
        tenant_id: Option<Uuid>,
        user_id: String,
        role: Role,
        principal: Principal,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
            principal,
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Resolves the tenant header plus the acting principal into a
/// [`RequestContext`], or a terminal authorization failure.
///
/// Failures collapse deliberately: a tenant that does not exist, a tenant
/// that is not active and a user without a binding all answer
/// `TENANT_FORBIDDEN`, so callers cannot enumerate tenants.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    tenant_header: String,
    admin_bypass: bool,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, security: &SecurityConfig) -> Self {
        Self {
            directory,
            tenant_header: security.tenant_header.clone(),
            admin_bypass: security.admin_bypass,
        }
    }

    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        principal: &Principal,
        admin_route: bool,
    ) -> Result<RequestContext, ApiError> {
        let raw = headers
            .get(self.tenant_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(raw) = raw else {
            if admin_route && self.admin_bypass {
                let is_admin = principal.is_global_admin
                    || self
                        .directory
                        .has_admin_binding(&principal.id)
                        .await
                        .map_err(ApiError::from)?;
                if is_admin {
                    tracing::debug!(user_id = %principal.id, "header-less admin access");
                    return Ok(RequestContext::new(
                        None,
                        principal.id.clone(),
                        Role::Admin,
                        principal.clone(),
                    ));
                }
            }
            tracing::warn!(user_id = %principal.id, admin_route, "tenant header missing");
            return Err(ApiError::TenantHeaderRequired);
        };

        let Some(tenant_id) = parse_canonical_uuid(raw) else {
            tracing::warn!(user_id = %principal.id, value = %raw, "malformed tenant header");
            return Err(ApiError::TenantHeaderInvalid {
                value: raw.to_string(),
            });
        };

        let tenant = self
            .directory
            .find_tenant(tenant_id)
            .await
            .map_err(ApiError::from)?;
        let Some(tenant) = tenant else {
            tracing::warn!(user_id = %principal.id, %tenant_id, "tenant not in registry");
            return Err(ApiError::TenantForbidden);
        };

        if !tenant.status.is_active() {
            tracing::warn!(
                user_id = %principal.id,
                %tenant_id,
                status = tenant.status.as_str(),
                "tenant not active"
            );
            return Err(ApiError::TenantForbidden);
        }

        let binding = self
            .directory
            .find_role_binding(&principal.id, tenant_id)
            .await
            .map_err(ApiError::from)?;
        let Some(binding) = binding else {
            // The core isolation guarantee: no binding, no access, whatever
            // else the request claims.
            tracing::warn!(user_id = %principal.id, %tenant_id, "no role binding for tenant");
            return Err(ApiError::TenantForbidden);
        };

        if admin_route && binding.role != Role::Admin {
            tracing::warn!(
                user_id = %principal.id,
                %tenant_id,
                role = binding.role.as_str(),
                "admin route refused for non-admin role"
            );
            return Err(ApiError::RoleForbidden);
        }

        Ok(RequestContext::new(
            Some(tenant_id),
            principal.id.clone(),
            binding.role,
            principal.clone(),
        ))
    }
}

/// RFC 4122 canonical form only (hyphenated, case-insensitive). The laxer
/// simple/urn spellings the uuid crate accepts are rejected here.
fn parse_canonical_uuid(s: &str) -> Option<Uuid> {
    let parsed = Uuid::try_parse(s).ok()?;
    s.eq_ignore_ascii_case(&parsed.as_hyphenated().to_string())
        .then_some(parsed)
}

pub async fn tenant_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0)
        .unwrap_or_else(Uuid::new_v4);

    let Some(principal) = request.extensions().get::<Principal>().cloned() else {
        tracing::error!(%request_id, "tenant resolution reached without a principal");
        return envelope::failure(request_id, &ApiError::InternalError);
    };

    // Admin-gate decision is made from the static route table before any
    // lookup, so the resolver applies the right bypass/role branch.
    let admin_route = routes::requires_admin(request.method(), request.uri().path());

    match state
        .resolver
        .resolve(request.headers(), &principal, admin_route)
        .await
    {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => envelope::failure(request_id, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StoreTenantDirectory;
    use crate::store::MemoryRecordStore;
    use serde_json::{json, Map, Value};

    fn record(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    fn principal(id: &str, global_admin: bool) -> Principal {
        Principal {
            id: id.to_string(),
            is_global_admin: global_admin,
            claims: Map::new(),
        }
    }

    fn security(admin_bypass: bool) -> SecurityConfig {
        SecurityConfig {
            tenant_header: "x-cliente-id".to_string(),
            admin_bypass,
            introspection_url: String::new(),
            introspection_timeout_secs: 1,
        }
    }

    fn headers_with(tenant: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-cliente-id", tenant.parse().unwrap());
        headers
    }

    struct Fixture {
        resolver: TenantResolver,
        tenant_a: Uuid,
        tenant_b: Uuid,
        tenant_inactive: Uuid,
    }

    async fn fixture(admin_bypass: bool) -> Fixture {
        let store = Arc::new(MemoryRecordStore::new());
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let tenant_inactive = Uuid::new_v4();

        for (id, nome, status) in [
            (tenant_a, "Academia Norte", "active"),
            (tenant_b, "Academia Sul", "active"),
            (tenant_inactive, "Academia Leste", "suspended"),
        ] {
            store
                .seed(
                    "clientes",
                    record(json!({ "id": id.to_string(), "nome": nome, "status": status })),
                )
                .await;
        }

        for (user, tenant, role) in [
            ("user-admin", tenant_a, "admin"),
            ("user-client", tenant_a, "client"),
            ("user-client", tenant_inactive, "client"),
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

        let directory = Arc::new(StoreTenantDirectory::new(store));
        Fixture {
            resolver: TenantResolver::new(directory, &security(admin_bypass)),
            tenant_a,
            tenant_b,
            tenant_inactive,
        }
    }

    #[tokio::test]
    async fn resolves_bound_user() {
        let f = fixture(false).await;
        let ctx = f
            .resolver
            .resolve(
                &headers_with(&f.tenant_a.to_string()),
                &principal("user-client", false),
                false,
            )
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id(), Some(f.tenant_a));
        assert_eq!(ctx.role(), Role::Client);
        assert_eq!(ctx.user_id(), "user-client");
    }

    #[tokio::test]
    async fn missing_header_is_required() {
        let f = fixture(false).await;
        let err = f
            .resolver
            .resolve(&HeaderMap::new(), &principal("user-client", false), false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_HEADER_REQUIRED");
    }

    #[tokio::test]
    async fn malformed_header_is_invalid() {
        let f = fixture(false).await;
        for bad in ["not-a-uuid", "1234", "urn:uuid:6ba7b810-9dad-11d1-80b4-00c04fd430c8"] {
            let err = f
                .resolver
                .resolve(&headers_with(bad), &principal("user-client", false), false)
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "TENANT_HEADER_INVALID", "value: {}", bad);
        }

        // Canonical form is accepted case-insensitively
        let upper = f.tenant_a.to_string().to_uppercase();
        assert!(f
            .resolver
            .resolve(&headers_with(&upper), &principal("user-client", false), false)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unknown_inactive_and_unbound_tenants_collapse() {
        let f = fixture(false).await;
        let p = principal("user-client", false);

        // Tenant that does not exist
        let err = f
            .resolver
            .resolve(&headers_with(&Uuid::new_v4().to_string()), &p, false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_FORBIDDEN");

        // Tenant that exists but the user is not bound to
        let err = f
            .resolver
            .resolve(&headers_with(&f.tenant_b.to_string()), &p, false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_FORBIDDEN");

        // Tenant the user is bound to but which is not active
        let err = f
            .resolver
            .resolve(&headers_with(&f.tenant_inactive.to_string()), &p, false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_FORBIDDEN");
    }

    #[tokio::test]
    async fn admin_route_needs_admin_role() {
        let f = fixture(false).await;
        let err = f
            .resolver
            .resolve(
                &headers_with(&f.tenant_a.to_string()),
                &principal("user-client", false),
                true,
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ROLE_FORBIDDEN");

        let ctx = f
            .resolver
            .resolve(
                &headers_with(&f.tenant_a.to_string()),
                &principal("user-admin", false),
                true,
            )
            .await
            .unwrap();
        assert_eq!(ctx.role(), Role::Admin);
    }

    #[tokio::test]
    async fn bypass_requires_flag_and_admin_standing() {
        // Flag off: even a flagged global admin needs the header
        let f = fixture(false).await;
        let err = f
            .resolver
            .resolve(&HeaderMap::new(), &principal("root", true), true)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_HEADER_REQUIRED");

        // Flag on: a flagged global admin passes with no header on admin routes
        let f = fixture(true).await;
        let ctx = f
            .resolver
            .resolve(&HeaderMap::new(), &principal("root", true), true)
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id(), None);
        assert_eq!(ctx.role(), Role::Admin);

        // A tenant admin binding also qualifies
        let ctx = f
            .resolver
            .resolve(&HeaderMap::new(), &principal("user-admin", false), true)
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id(), None);

        // Ordinary users never do
        let err = f
            .resolver
            .resolve(&HeaderMap::new(), &principal("user-client", false), true)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_HEADER_REQUIRED");

        // Non-admin routes get no bypass at all
        let err = f
            .resolver
            .resolve(&HeaderMap::new(), &principal("root", true), false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TENANT_HEADER_REQUIRED");
    }
}
