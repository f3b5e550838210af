// HTTP API Error Types
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::rbac::{Action, Role};
use crate::store::StoreError;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// This is a closed set: every variant carries a fixed error code and a fixed
/// status mapping, so the transport mapping is exhaustive and checked by the
/// compiler rather than scattered through handlers.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    TenantHeaderRequired,
    TenantHeaderInvalid { value: String },
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    TenantForbidden,
    RoleForbidden,
    PermissionDenied {
        resource: String,
        action: Action,
        role: Option<Role>,
        attempted: Option<Vec<(String, Action)>>,
    },

    // 404 Not Found
    NotFound {
        message: String,
        details: Option<Value>,
    },

    // 500 Internal Server Error
    InternalError,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::TenantHeaderRequired => StatusCode::BAD_REQUEST,
            ApiError::TenantHeaderInvalid { .. } => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::TenantForbidden => StatusCode::FORBIDDEN,
            ApiError::RoleForbidden => StatusCode::FORBIDDEN,
            ApiError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::TenantHeaderRequired => "TENANT_HEADER_REQUIRED",
            ApiError::TenantHeaderInvalid { .. } => "TENANT_HEADER_INVALID",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::TenantForbidden => "TENANT_FORBIDDEN",
            ApiError::RoleForbidden => "ROLE_FORBIDDEN",
            ApiError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get client-safe error message.
    ///
    /// Authorization failures deliberately share one generic message per code:
    /// the caller must not be able to tell a missing tenant from an unbound
    /// user or an inactive tenant.
    pub fn message(&self) -> String {
        match self {
            ApiError::TenantHeaderRequired => "Tenant header is required".to_string(),
            ApiError::TenantHeaderInvalid { .. } => {
                "Tenant header must be a valid UUID".to_string()
            }
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::TenantForbidden => "Access to this tenant is denied".to_string(),
            ApiError::RoleForbidden => "This route requires an admin role".to_string(),
            ApiError::PermissionDenied { .. } => "Permission denied".to_string(),
            ApiError::NotFound { message, .. } => message.clone(),
            ApiError::InternalError => {
                "An unexpected error occurred while processing your request".to_string()
            }
        }
    }

    /// Structured details for the error body, where the variant carries any.
    pub fn details(&self) -> Option<Value> {
        match self {
            ApiError::TenantHeaderInvalid { value } => Some(json!({ "value": value })),
            ApiError::ValidationError { field_errors, .. } => {
                field_errors.as_ref().map(|fe| json!({ "field_errors": fe }))
            }
            ApiError::PermissionDenied {
                resource,
                action,
                role,
                attempted,
            } => {
                let mut d = json!({
                    "resource": resource,
                    "action": action.as_str(),
                    "role": role.map(|r| r.as_str()),
                });
                if let Some(attempted) = attempted {
                    d["attempted"] = Value::Array(
                        attempted
                            .iter()
                            .map(|(res, act)| json!({ "resource": res, "action": act.as_str() }))
                            .collect(),
                    );
                }
                Some(d)
            }
            ApiError::NotFound { details, .. } => details.clone(),
            _ => None,
        }
    }

    /// Error body for the response envelope: { code, message, details? }
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "code": self.error_code(),
            "message": self.message(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        body
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn validation_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
}

// Store failures cross into API land here; internals never reach the client.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                ApiError::not_found(format!("{} {} not found", collection, id))
            }
            StoreError::UnknownCollection(name) => {
                tracing::error!(collection = %name, "query against unknown collection");
                ApiError::InternalError
            }
            StoreError::Backend(msg) => {
                tracing::error!("record store error: {}", msg);
                ApiError::InternalError
            }
            StoreError::Serialization(msg) => {
                tracing::error!("record serialization error: {}", msg);
                ApiError::InternalError
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ApiError {}
