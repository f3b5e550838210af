use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::middleware::tenant::RequestContext;

/// Role a user holds within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
            Role::Student => "student",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Mutating actions go through the audit trail.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

/// Allowed roles per action for one resource. An empty list permanently
/// disables the action for every tenant role (system-only operations).
#[derive(Debug, Clone, Default)]
pub struct PermissionRule {
    pub read: Vec<Role>,
    pub create: Vec<Role>,
    pub update: Vec<Role>,
    pub delete: Vec<Role>,
}

impl PermissionRule {
    fn allowed(&self, action: Action) -> &[Role] {
        match action {
            Action::Read => &self.read,
            Action::Create => &self.create,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
        }
    }
}

/// The process-wide default rule table. Loaded once, never mutated.
static DEFAULT_RULES: Lazy<HashMap<String, PermissionRule>> = Lazy::new(|| {
    use Role::*;

    let mut rules = HashMap::new();
    rules.insert(
        "clientes".to_string(),
        PermissionRule {
            read: vec![Admin, Client],
            create: vec![Admin],
            update: vec![Admin],
            delete: vec![Admin],
        },
    );
    rules.insert(
        "contratos".to_string(),
        PermissionRule {
            read: vec![Admin, Client],
            create: vec![Admin, Client],
            update: vec![Admin, Client],
            delete: vec![Admin],
        },
    );
    rules.insert(
        "produtos".to_string(),
        PermissionRule {
            read: vec![Admin, Client, Student],
            create: vec![Admin],
            update: vec![Admin],
            delete: vec![Admin],
        },
    );
    rules.insert(
        "alunos".to_string(),
        PermissionRule {
            read: vec![Admin, Client],
            create: vec![Admin, Client],
            update: vec![Admin, Client],
            delete: vec![Admin],
        },
    );
    // Dashboard aggregates are system-written; tenants only read them.
    rules.insert(
        "dashboard".to_string(),
        PermissionRule {
            read: vec![Admin, Client],
            ..Default::default()
        },
    );
    // The audit trail is append-only through the executor; no tenant role
    // writes it directly.
    rules.insert(
        "audit_events".to_string(),
        PermissionRule {
            read: vec![Admin],
            ..Default::default()
        },
    );
    rules
});

/// Static resource × action → allowed-roles table.
///
/// Constructed once at startup and shared read-only across requests; a
/// flagged global admin bypasses it entirely, and unknown resources are
/// denied outright.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    rules: HashMap<String, PermissionRule>,
}

impl PermissionMatrix {
    pub fn with_default_rules() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    pub fn has_permission(&self, ctx: &RequestContext, resource: &str, action: Action) -> bool {
        if ctx.principal().is_global_admin {
            return true;
        }

        let Some(rule) = self.rules.get(resource) else {
            // Fail closed: an unknown resource must never default to allow.
            tracing::warn!(
                resource = %resource,
                action = %action.as_str(),
                "permission check against unconfigured resource, denying"
            );
            return false;
        };

        rule.allowed(action).contains(&ctx.role())
    }

    pub fn validate_permission(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: Action,
    ) -> Result<(), ApiError> {
        if self.has_permission(ctx, resource, action) {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied {
                resource: resource.to_string(),
                action,
                role: Some(ctx.role()),
                attempted: None,
            })
        }
    }

    /// Every listed pair must pass; short-circuits on the first failure and
    /// returns that failure's detail.
    pub fn require_all(
        &self,
        ctx: &RequestContext,
        permissions: &[(&str, Action)],
    ) -> Result<(), ApiError> {
        for (resource, action) in permissions {
            self.validate_permission(ctx, resource, *action)?;
        }
        Ok(())
    }

    /// At least one listed pair must pass; the composite failure lists every
    /// attempted permission along with the caller's role.
    pub fn require_any(
        &self,
        ctx: &RequestContext,
        permissions: &[(&str, Action)],
    ) -> Result<(), ApiError> {
        for (resource, action) in permissions {
            if self.has_permission(ctx, resource, *action) {
                return Ok(());
            }
        }

        let (resource, action) = permissions
            .first()
            .map(|(r, a)| (r.to_string(), *a))
            .unwrap_or_else(|| ("".to_string(), Action::Read));

        Err(ApiError::PermissionDenied {
            resource,
            action,
            role: Some(ctx.role()),
            attempted: Some(
                permissions
                    .iter()
                    .map(|(r, a)| (r.to_string(), *a))
                    .collect(),
            ),
        })
    }
}
